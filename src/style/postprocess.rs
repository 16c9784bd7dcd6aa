//! KFX style post-processing.
//!
//! Runs once after defaults and author CSS are registered, before content
//! resolution. Title styles receive the `treat_as_title` layout hint,
//! title wrappers become unbreakable, and intermediate break markers turn
//! into the yj-break properties KP3 emits.

use crate::kfx::symbol::Sym;
use crate::kfx::value::Value;
use crate::style::merge::{MergeContext, merge_property};
use crate::style::registry::StyleRegistry;

/// Title-text styles addressed by exact name.
const NAMED_TITLE_STYLES: &[&str] = &["annotation-title", "toc-title", "footnote-title"];

pub fn postprocess_styles(registry: &mut StyleRegistry) {
    for name in registry.names() {
        if is_title_text(registry, &name) {
            let def = registry.get_mut(&name).expect("style present");
            merge_property(
                &mut def.properties,
                Sym::LayoutHints,
                &Value::List(vec![Value::Symbol(Sym::TreatAsTitle)]),
                MergeContext::Inline,
            );
            // The wrapper owns the spacing below a title.
            def.properties.remove(Sym::MarginBottom);
        } else if is_title_wrapper(&name) {
            let def = registry.get_mut(&name).expect("style present");
            def.properties
                .set(Sym::BreakInside, Value::Symbol(Sym::Avoid));
            if !def.properties.contains(Sym::LineHeight) {
                def.properties
                    .set(Sym::LineHeight, Value::dimension(1.into(), Sym::Lh));
            }
        }

        convert_break_markers(registry, &name);
    }

    substitute_default_font_family(registry);
}

/// `font-family: default` defers to the body face; without one the
/// property drops so the device default applies.
fn substitute_default_font_family(registry: &mut StyleRegistry) {
    let body_family = registry
        .get("body")
        .and_then(|def| def.properties.get(Sym::FontFamily))
        .filter(|family| !matches!(family, Value::String(name) if name == "default"))
        .cloned();

    for name in registry.names() {
        let Some(def) = registry.get_mut(&name) else { continue };
        let is_default = matches!(
            def.properties.get(Sym::FontFamily),
            Some(Value::String(family)) if family == "default"
        );
        if !is_default {
            continue;
        }
        match &body_family {
            Some(family) => {
                let family = family.clone();
                def.properties.set(Sym::FontFamily, family);
            }
            None => {
                def.properties.remove(Sym::FontFamily);
            }
        }
    }
}

/// Heading tags, `*-title-header` styles, centered subtitles, and the
/// named title styles are title text.
fn is_title_text(registry: &StyleRegistry, name: &str) -> bool {
    if matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
        return true;
    }
    if name.ends_with("-title-header") {
        return true;
    }
    if NAMED_TITLE_STYLES.contains(&name) {
        return true;
    }
    if name.ends_with("-subtitle") {
        let centered = registry
            .get(name)
            .and_then(|def| def.properties.get(Sym::TextAlign))
            .and_then(Value::as_symbol)
            == Some(Sym::Center);
        return centered;
    }
    false
}

fn is_title_wrapper(name: &str) -> bool {
    name.ends_with("-title")
        && !NAMED_TITLE_STYLES.contains(&name)
        && !name.ends_with("-title-header")
}

/// `keep-first`/`keep-last` become `yj-break-before`/`yj-break-after`;
/// an unbreakable style never also forces a break before itself.
fn convert_break_markers(registry: &mut StyleRegistry, name: &str) {
    let Some(def) = registry.get_mut(name) else { return };
    let props = &mut def.properties;

    if props.remove(Sym::KeepFirst).is_some() {
        props.set(Sym::YjBreakBefore, Value::Symbol(Sym::Always));
    }
    if props.remove(Sym::KeepLast).is_some() {
        props.set(Sym::YjBreakAfter, Value::Symbol(Sym::Always));
    }
    if props.get(Sym::BreakInside).and_then(Value::as_symbol) == Some(Sym::Avoid) {
        props.remove(Sym::YjBreakBefore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::defaults::default_registry;
    use crate::style::registry::StyleDef;

    #[test]
    fn test_headings_get_title_hint_and_lose_bottom_margin() {
        let mut registry = default_registry();
        postprocess_styles(&mut registry);

        let h1 = registry.get("h1").unwrap();
        assert_eq!(
            h1.properties.get(Sym::LayoutHints),
            Some(&Value::List(vec![Value::Symbol(Sym::TreatAsTitle)]))
        );
        assert!(!h1.properties.contains(Sym::MarginBottom));
        assert!(h1.properties.contains(Sym::MarginTop));
    }

    #[test]
    fn test_title_wrappers_become_unbreakable() {
        let mut registry = default_registry();
        postprocess_styles(&mut registry);

        let wrapper = registry.get("section-title").unwrap();
        assert_eq!(
            wrapper.properties.get(Sym::BreakInside),
            Some(&Value::Symbol(Sym::Avoid))
        );
        assert_eq!(
            wrapper.properties.get(Sym::LineHeight),
            Some(&Value::dimension(1.into(), Sym::Lh))
        );
    }

    #[test]
    fn test_named_title_styles_are_text_not_wrappers() {
        let mut registry = default_registry();
        postprocess_styles(&mut registry);

        let annotation_title = registry.get("annotation-title").unwrap();
        assert!(annotation_title.properties.contains(Sym::LayoutHints));
        assert!(!annotation_title.properties.contains(Sym::BreakInside));
    }

    #[test]
    fn test_break_markers_convert() {
        let mut registry = default_registry();
        registry.register(StyleDef::new("chapter-break").with(Sym::KeepFirst, Value::Bool(true)));
        postprocess_styles(&mut registry);

        let def = registry.get("chapter-break").unwrap();
        assert!(!def.properties.contains(Sym::KeepFirst));
        assert_eq!(
            def.properties.get(Sym::YjBreakBefore),
            Some(&Value::Symbol(Sym::Always))
        );
    }

    #[test]
    fn test_default_font_family_substitution() {
        let mut registry = default_registry();
        registry.register(
            StyleDef::new("body").with(Sym::FontFamily, Value::String("Bookerly".to_string())),
        );
        registry.register(
            StyleDef::new("quote").with(Sym::FontFamily, Value::String("default".to_string())),
        );
        registry.register(
            StyleDef::new("mono").with(Sym::FontFamily, Value::String("monospace".to_string())),
        );
        postprocess_styles(&mut registry);

        assert_eq!(
            registry.get("quote").unwrap().properties.get(Sym::FontFamily),
            Some(&Value::String("Bookerly".to_string()))
        );
        // Concrete generic families pass through untouched.
        assert_eq!(
            registry.get("mono").unwrap().properties.get(Sym::FontFamily),
            Some(&Value::String("monospace".to_string()))
        );
    }

    #[test]
    fn test_default_font_family_drops_without_body_face() {
        let mut registry = default_registry();
        registry.register(
            StyleDef::new("quote").with(Sym::FontFamily, Value::String("default".to_string())),
        );
        postprocess_styles(&mut registry);
        assert!(
            !registry.get("quote").unwrap().properties.contains(Sym::FontFamily)
        );
    }

    #[test]
    fn test_break_inside_avoid_suppresses_break_before() {
        let mut registry = default_registry();
        registry.register(
            StyleDef::new("fresh-page-title")
                .with(Sym::KeepFirst, Value::Bool(true))
                .with(Sym::BreakInside, Value::Symbol(Sym::Avoid)),
        );
        postprocess_styles(&mut registry);

        let def = registry.get("fresh-page-title").unwrap();
        assert!(!def.properties.contains(Sym::YjBreakBefore));
        assert_eq!(
            def.properties.get(Sym::YjBreakAfter),
            None
        );
    }
}
