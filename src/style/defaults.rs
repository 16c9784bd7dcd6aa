//! Built-in style defaults.
//!
//! The default set mirrors what Kindle Previewer assumes before any author
//! CSS applies: heading scales, inline tag behavior, the FB2 structural
//! classes, and the replacement styles that let sub/sup inherit a heading's
//! font size. Everything here is constructed in code so a registry can be
//! rebuilt from scratch at any time.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::kfx::symbol::Sym;
use crate::kfx::value::Value;
use crate::style::registry::{StyleDef, StyleRegistry};

fn dim(text: &str, unit: Sym) -> Value {
    Value::dimension(Decimal::from_str(text).expect("default measure literal"), unit)
}

/// Install the built-in defaults into a registry.
pub fn install_defaults(registry: &mut StyleRegistry) {
    // Paragraph baseline. Margins stay zero; indentation comes from CSS.
    registry.register(StyleDef::new("p"));

    // Heading scale, browser-conventional sizes with vertical spacing in
    // line heights.
    let headings: [(&str, &str, &str); 6] = [
        ("h1", "2", "0.67"),
        ("h2", "1.5", "0.83"),
        ("h3", "1.17", "1"),
        ("h4", "1", "1.33"),
        ("h5", "0.83", "1.67"),
        ("h6", "0.67", "2.33"),
    ];
    for (name, size, margin) in headings {
        registry.register(
            StyleDef::new(name)
                .with(Sym::FontSize, dim(size, Sym::Em))
                .with(Sym::FontWeight, Value::Symbol(Sym::Bold))
                .with(Sym::MarginTop, dim(margin, Sym::Lh))
                .with(Sym::MarginBottom, dim(margin, Sym::Lh)),
        );
    }

    // Inline tags.
    registry.register(StyleDef::new("strong").with(Sym::FontWeight, Value::Symbol(Sym::Bold)));
    registry.register(StyleDef::new("emphasis").with(Sym::FontStyle, Value::Symbol(Sym::Italic)));
    registry.register(StyleDef::new("strike").with(Sym::Strikethrough, Value::Bool(true)));
    registry.register(StyleDef::new("u").with(Sym::Underline, Value::Bool(true)));
    registry.register(StyleDef::new("a").with(Sym::Underline, Value::Bool(true)));
    registry.register(
        StyleDef::new("code")
            .with(Sym::FontFamily, Value::String("monospace".to_string()))
            .with(Sym::FontSize, dim("0.85", Sym::Rem)),
    );

    // Sub/sup shrink text and shift the baseline. Inside headings the
    // replacement styles below keep the heading's font size instead.
    let mut sub = StyleDef::new("sub")
        .with(Sym::BaselineStyle, Value::Symbol(Sym::Subscript))
        .with(Sym::FontSize, dim("0.75", Sym::Rem));
    sub.descendant_replacement = true;
    registry.register(sub);

    let mut sup = StyleDef::new("sup")
        .with(Sym::BaselineStyle, Value::Symbol(Sym::Superscript))
        .with(Sym::FontSize, dim("0.75", Sym::Rem));
    sup.descendant_replacement = true;
    registry.register(sup);

    for level in 1..=6 {
        registry.register(
            StyleDef::new(format!("h{level}--sub"))
                .with(Sym::BaselineStyle, Value::Symbol(Sym::Subscript)),
        );
        registry.register(
            StyleDef::new(format!("h{level}--sup"))
                .with(Sym::BaselineStyle, Value::Symbol(Sym::Superscript)),
        );
    }

    // FB2 structural classes. Container margins indent their children
    // through block inheritance.
    registry.register(StyleDef::new("section"));
    registry.register(
        StyleDef::new("epigraph")
            .with(Sym::MarginLeft, dim("25", Sym::Percent))
            .with(Sym::MarginTop, dim("1", Sym::Lh))
            .with(Sym::MarginBottom, dim("1", Sym::Lh))
            .with(Sym::TextAlign, Value::Symbol(Sym::Left)),
    );
    registry.register(
        StyleDef::new("cite")
            .with(Sym::MarginLeft, dim("6.25", Sym::Percent))
            .with(Sym::MarginRight, dim("6.25", Sym::Percent))
            .with(Sym::MarginTop, dim("1", Sym::Lh))
            .with(Sym::MarginBottom, dim("1", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("poem")
            .with(Sym::MarginLeft, dim("9.375", Sym::Percent))
            .with(Sym::MarginTop, dim("1", Sym::Lh))
            .with(Sym::MarginBottom, dim("1", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("stanza")
            .with(Sym::MarginTop, dim("1", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("annotation")
            .with(Sym::FontStyle, Value::Symbol(Sym::Italic))
            .with(Sym::MarginTop, dim("1", Sym::Lh))
            .with(Sym::MarginBottom, dim("1", Sym::Lh)),
    );
    registry.register(StyleDef::new("footnote").with(Sym::FontSize, dim("0.9", Sym::Rem)));

    registry.register(
        StyleDef::new("verse")
            .with(Sym::TextIndent, dim("0", Sym::Px)),
    );
    registry.register(
        StyleDef::new("subtitle")
            .with(Sym::FontWeight, Value::Symbol(Sym::Bold))
            .with(Sym::TextAlign, Value::Symbol(Sym::Center))
            .with(Sym::MarginTop, dim("1", Sym::Lh))
            .with(Sym::MarginBottom, dim("1", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("text-author")
            .with(Sym::TextAlign, Value::Symbol(Sym::Right))
            .with(Sym::FontStyle, Value::Symbol(Sym::Italic)),
    );
    registry.register(StyleDef::new("date").with(Sym::FontStyle, Value::Symbol(Sym::Italic)));

    // The one-shot margin deposited by <empty-line/>.
    registry.register(StyleDef::new("emptyline").with(Sym::MarginTop, dim("1", Sym::Lh)));

    // Title wrappers. Their margins distribute onto first/last children.
    registry.register(
        StyleDef::new("body-title")
            .with(Sym::MarginTop, dim("2.6", Sym::Lh))
            .with(Sym::MarginBottom, dim("2.6", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("section-title")
            .with(Sym::MarginTop, dim("2.6", Sym::Lh))
            .with(Sym::MarginBottom, dim("1.56", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("poem-title")
            .with(Sym::MarginTop, dim("1", Sym::Lh))
            .with(Sym::MarginBottom, dim("1", Sym::Lh)),
    );
    registry.register(
        StyleDef::new("annotation-title")
            .with(Sym::TextAlign, Value::Symbol(Sym::Center))
            .with(Sym::FontWeight, Value::Symbol(Sym::Bold)),
    );
    registry.register(
        StyleDef::new("footnote-title")
            .with(Sym::FontWeight, Value::Symbol(Sym::Bold)),
    );
    registry.register(
        StyleDef::new("toc-title")
            .with(Sym::TextAlign, Value::Symbol(Sym::Center))
            .with(Sym::FontWeight, Value::Symbol(Sym::Bold)),
    );

    // Title text inside wrappers.
    registry.register(
        StyleDef::new("section-title-header")
            .with(Sym::TextAlign, Value::Symbol(Sym::Center))
            .with(Sym::FontWeight, Value::Symbol(Sym::Bold)),
    );

    // Tables. Collapse and spacing migrate to the table element during
    // resolution.
    registry.register(
        StyleDef::new("table")
            .with(Sym::BorderCollapse, Value::Symbol(Sym::Collapse))
            .with(Sym::BorderSpacingHorizontal, dim("0", Sym::Px))
            .with(Sym::BorderSpacingVertical, dim("0", Sym::Px)),
    );
    registry.register(
        StyleDef::new("th")
            .with(Sym::FontWeight, Value::Symbol(Sym::Bold))
            .with(Sym::TextAlign, Value::Symbol(Sym::Center))
            .with(Sym::PaddingLeft, dim("0.25", Sym::Em))
            .with(Sym::PaddingRight, dim("0.25", Sym::Em)),
    );
    registry.register(
        StyleDef::new("td")
            .with(Sym::PaddingLeft, dim("0.25", Sym::Em))
            .with(Sym::PaddingRight, dim("0.25", Sym::Em)),
    );
}

/// A registry with the built-in defaults installed.
pub fn default_registry() -> StyleRegistry {
    let mut registry = StyleRegistry::new();
    install_defaults(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::registry::UNKNOWN_STYLE;

    #[test]
    fn test_unknown_style_present_with_line_height() {
        let registry = default_registry();
        let def = registry.get(UNKNOWN_STYLE).unwrap();
        assert_eq!(def.properties.get(Sym::LineHeight), Some(&dim("1", Sym::Lh)));
    }

    #[test]
    fn test_heading_replacement_styles_exist() {
        let registry = default_registry();
        for level in 1..=6 {
            let sub = registry.get(&format!("h{level}--sub")).unwrap();
            assert_eq!(
                sub.properties.get(Sym::BaselineStyle),
                Some(&Value::Symbol(Sym::Subscript))
            );
            assert!(!sub.properties.contains(Sym::FontSize));
            assert!(registry.get(&format!("h{level}--sup")).is_some());
        }
    }

    #[test]
    fn test_sub_sup_flagged_for_replacement() {
        let registry = default_registry();
        assert!(registry.get("sub").unwrap().descendant_replacement);
        assert!(registry.get("sup").unwrap().descendant_replacement);
        assert!(!registry.get("strong").unwrap().descendant_replacement);
    }

    #[test]
    fn test_container_classes_registered() {
        let registry = default_registry();
        for name in crate::style::registry::CONTAINER_CLASSES {
            assert!(registry.contains(name), "missing container class {name}");
        }
    }
}
