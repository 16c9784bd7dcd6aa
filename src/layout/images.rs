//! Image style computation.
//!
//! Images never inherit text styling; their dimensions come from the
//! probed pixel size. Inline images scale in em against the base font.
//! Block images either float full-width with fixed vertical margins or
//! join the normal flow and align with the surrounding text.

use rust_decimal::Decimal;

use crate::kfx::symbol::Sym;
use crate::kfx::value::{
    Dimension, NOMINAL_SIG_FIGS, Value, ValueMap, WIDTH_PERCENT_FRAC_DIGITS, round_fractional,
    round_significant,
};
use crate::options::Options;
use crate::style::context::StyleContext;
use crate::style::registry::StyleRegistry;
use crate::warn::Warnings;

/// CSS reference font size; pixel dimensions convert to em against it.
const BASE_FONT_PX: u32 = 16;

/// Fixed vertical margin around full-width float images.
fn float_margin() -> Dimension {
    Dimension::new(Decimal::new(26, 1), Sym::Lh)
}

/// A computed block-image style.
#[derive(Debug, Clone)]
pub struct BlockImageStyle {
    pub name: String,
    pub props: ValueMap,
    pub is_float: bool,
}

/// Width as a percentage of the output screen, clamped to [0, 100] and
/// carried with exactly three fractional digits.
pub fn width_percent(width_px: u32, options: &Options) -> Dimension {
    let percent = Decimal::from(width_px * 100)
        / Decimal::from(options.screen_width.max(1));
    let clamped = percent.clamp(Decimal::ZERO, Decimal::from(100));
    Dimension::new(
        round_fractional(clamped, WIDTH_PERCENT_FRAC_DIGITS),
        Sym::Percent,
    )
}

/// Resolve the style for an image flowing inside a line of text.
pub fn inline_image_style(
    registry: &mut StyleRegistry,
    width_px: u32,
    height_px: u32,
    warnings: &mut Warnings,
) -> String {
    let to_em = |px: u32| {
        round_significant(
            Decimal::from(px) / Decimal::from(BASE_FONT_PX),
            NOMINAL_SIG_FIGS,
        )
    };
    let mut props = ValueMap::new();
    props.set(Sym::Width, Value::dimension(to_em(width_px), Sym::Em));
    props.set(Sym::Height, Value::dimension(to_em(height_px), Sym::Em));
    props.set(Sym::BaselineStyle, Value::Symbol(Sym::Center));
    registry.register_resolved_inline(&props, warnings)
}

/// Resolve the style for a block image.
///
/// `class_props` carries whatever the source classes declared; text-only
/// and dimension properties are filtered because dimensions come from the
/// actual image. `centered_block` reflects the enclosing block's
/// alignment; `standalone` marks an image that is its own paragraph.
#[allow(clippy::too_many_arguments)]
pub fn block_image_style(
    registry: &mut StyleRegistry,
    context: &StyleContext,
    class_props: &ValueMap,
    width_px: u32,
    options: &Options,
    centered_block: bool,
    standalone: bool,
    warnings: &mut Warnings,
) -> BlockImageStyle {
    let mut props = class_props.clone();
    for text_only in [
        Sym::TextIndent,
        Sym::TextAlign,
        Sym::LineHeight,
        Sym::Width,
        Sym::Height,
        Sym::FontSize,
        Sym::FontStyle,
        Sym::FontWeight,
        Sym::FontFamily,
    ] {
        props.remove(text_only);
    }

    props.set(Sym::Width, Value::Dimension(width_percent(width_px, options)));
    props.set(Sym::LineHeight, Value::dimension(1.into(), Sym::Lh));

    let is_float = standalone && width_px >= options.content_width_threshold;
    if is_float {
        props.set(Sym::BoxAlign, Value::Symbol(Sym::Center));
        props.set(Sym::MarginTop, Value::Dimension(float_margin()));
        props.set(Sym::MarginBottom, Value::Dimension(float_margin()));
    } else {
        // Align with the container indent, falling back to the paragraph
        // text indent.
        if let Some(indent) = context.inherited().get_dimension(Sym::MarginLeft) {
            props.set(Sym::MarginLeft, Value::Dimension(indent.clone()));
        } else if let Some(indent) = context.inherited().get_dimension(Sym::TextIndent) {
            props.set(Sym::MarginLeft, Value::Dimension(indent.clone()));
        }
        if centered_block || standalone {
            props.set(Sym::BoxAlign, Value::Symbol(Sym::Center));
        }
    }

    let name = registry.register_resolved(&props, warnings);
    let props = registry.resolved_properties(&name, warnings);
    BlockImageStyle {
        name,
        props,
        is_float,
    }
}
