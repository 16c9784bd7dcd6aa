//! Conversion options.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::kfx::symbol::Sym;
use crate::kfx::value::Dimension;

/// Knobs for one conversion pass. The defaults target current Kindle
/// hardware and match KP3 output.
#[derive(Debug, Clone)]
pub struct Options {
    /// Output screen width in pixels; image widths emit as a percentage
    /// of this.
    pub screen_width: u32,
    /// Line height applied where nothing else specifies one.
    pub default_line_height: Dimension,
    /// Block images at least this wide become full-width floats.
    pub content_width_threshold: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            screen_width: 1264,
            default_line_height: Dimension::new(
                Decimal::from_str("1.0101").expect("line-height literal"),
                Sym::Lh,
            ),
            content_width_threshold: 512,
        }
    }
}
