//! End-to-end scenarios for the style engine.

use rust_decimal::Decimal;
use std::str::FromStr;

use fb2kfx::css::Stylesheet;
use fb2kfx::fb2::{self, ImageInfo};
use fb2kfx::kfx::value::{Value, ValueMap, format_decimal};
use fb2kfx::kfx::{FragmentList, Sym};
use fb2kfx::style::context::{LayoutState, StyleContext};
use fb2kfx::style::defaults::default_registry;
use fb2kfx::style::registry::StyleDef;
use fb2kfx::warn::Warnings;
use fb2kfx::{Options, convert};

fn dim(v: &str, unit: Sym) -> Value {
    Value::dimension(Decimal::from_str(v).unwrap(), unit)
}

/// The entries list of the storyline fragment.
fn storyline_entries(fragments: &FragmentList) -> Vec<ValueMap> {
    let storyline = fragments
        .of_type(Sym::Storyline)
        .next()
        .expect("storyline fragment");
    let fields = storyline.value.as_struct().expect("storyline struct");
    let Some(Value::List(entries)) = fields.get(Sym::Content) else {
        panic!("storyline content list");
    };
    entries
        .iter()
        .map(|entry| entry.as_struct().expect("entry struct").clone())
        .collect()
}

/// Resolved properties of the style a content entry references.
fn style_props(fragments: &FragmentList, entry: &ValueMap) -> ValueMap {
    let Some(Value::SymbolByName(name)) = entry.get(Sym::Style) else {
        panic!("entry style reference");
    };
    let style = fragments
        .find(Sym::Style, name)
        .unwrap_or_else(|| panic!("style fragment {name}"));
    style.value.as_struct().expect("style struct").clone()
}

fn entry_children(entry: &ValueMap) -> Vec<ValueMap> {
    let Some(Value::List(children)) = entry.get(Sym::Content) else {
        panic!("wrapper children");
    };
    children
        .iter()
        .map(|child| child.as_struct().expect("child struct").clone())
        .collect()
}

#[test]
fn css_to_style_registry() {
    let css = ".para { line-height: 1.2; text-indent: 1.5em; text-align: justify; }\n\
               .emphasis { font-style: italic; }";
    let mut warnings = Warnings::new();
    let sheet = Stylesheet::parse(css, &mut warnings);
    let mut registry = default_registry();
    registry.apply_stylesheet(&sheet);
    assert!(warnings.is_empty());

    let para = registry.get("para").expect("para registered");
    assert_eq!(para.properties.get(Sym::LineHeight), Some(&dim("1.2", Sym::Ratio)));
    assert_eq!(para.properties.get(Sym::TextIndent), Some(&dim("1.5", Sym::Em)));
    assert_eq!(
        para.properties.get(Sym::TextAlign),
        Some(&Value::Symbol(Sym::Justify))
    );

    let emphasis = registry.get("emphasis").expect("emphasis registered");
    assert_eq!(
        emphasis.properties.get(Sym::FontStyle),
        Some(&Value::Symbol(Sym::Italic))
    );
}

#[test]
fn cascade_filters_tag_zero_margin_under_block() {
    let mut registry = default_registry();
    registry.register(StyleDef::new("p").with(Sym::MarginLeft, dim("0", Sym::Px)));
    registry.register(StyleDef::new("poem").with(Sym::MarginLeft, dim("9.375", Sym::Percent)));

    let mut warnings = Warnings::new();
    let mut layout = LayoutState::new();
    let context = StyleContext::new().push_block(&mut registry, "poem", &mut warnings);
    let resolved = context.resolve(&mut registry, &mut layout, "p", &[], &mut warnings);

    assert_eq!(
        resolved.props.get(Sym::MarginLeft),
        Some(&dim("9.375", Sym::Percent))
    );
}

#[test]
fn descendant_replacement_keeps_heading_font_size() {
    let mut registry = default_registry();
    let mut warnings = Warnings::new();

    // Inside a 2em heading, `sub` must not carry its own font-size.
    let context = StyleContext::new().push(&mut registry, "h1", &[], &mut warnings);
    let resolved = context.resolve_inline(&mut registry, "", &["sub"], &mut warnings);

    assert_eq!(
        resolved.props.get(Sym::BaselineStyle),
        Some(&Value::Symbol(Sym::Subscript))
    );
    assert!(!resolved.props.contains(Sym::FontSize));
    assert_eq!(resolved.props.len(), 1);
}

#[test]
fn empty_line_margin_feeds_next_paragraph() {
    let xml = r#"<body><section>
        <p>Before</p>
        <empty-line/>
        <p>Hello</p>
        <p>After</p>
    </section></body>"#;
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, Some(".emptyline { margin: 1em }"), &Options::default());

    let entries = storyline_entries(&result.fragments);
    // The empty line itself emits nothing.
    assert_eq!(entries.len(), 3);

    let hello = style_props(&result.fragments, &entries[1]);
    assert_eq!(hello.get(Sym::MarginTop), Some(&dim("1", Sym::Lh)));

    // Only the next element consumes the margin.
    let after = style_props(&result.fragments, &entries[2]);
    assert!(after.get(Sym::MarginTop).is_none());
}

#[test]
fn title_block_margin_distribution() {
    let xml = r#"<body><section>
        <title><p>A</p><p>B</p><p>C</p></title>
        <p>Body text</p>
    </section></body>"#;
    let css = "section-title { margin-top: 2lh; margin-bottom: 1lh }";
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, Some(css), &Options::default());

    let entries = storyline_entries(&result.fragments);
    let wrapper = &entries[0];
    let children = entry_children(wrapper);
    assert_eq!(children.len(), 3);

    let a = style_props(&result.fragments, &children[0]);
    assert_eq!(a.get(Sym::MarginTop), Some(&dim("2", Sym::Lh)));
    assert!(a.get(Sym::MarginBottom).is_none());

    let b = style_props(&result.fragments, &children[1]);
    // B keeps its own top margin (the h1 default).
    assert_eq!(b.get(Sym::MarginTop), Some(&dim("0.67", Sym::Lh)));
    assert!(b.get(Sym::MarginBottom).is_none());

    let c = style_props(&result.fragments, &children[2]);
    assert_eq!(c.get(Sym::MarginTop), Some(&dim("0.67", Sym::Lh)));
    assert_eq!(c.get(Sym::MarginBottom), Some(&dim("1", Sym::Lh)));

    // The wrapper's own margins moved onto its children.
    let wrapper_style = style_props(&result.fragments, wrapper);
    assert!(wrapper_style.get(Sym::MarginTop).is_none());
    assert!(wrapper_style.get(Sym::MarginBottom).is_none());
    assert_eq!(
        wrapper_style.get(Sym::BreakInside),
        Some(&Value::Symbol(Sym::Avoid))
    );
}

#[test]
fn full_width_image_floats_and_skips_collapsing() {
    let xml = r##"<body><section>
        <p>Before the picture.</p>
        <image href="#wide.png" alt="Wide"/>
        <p>After the picture.</p>
    </section></body>"##;
    let mut document = fb2::parse_document(xml).unwrap();
    document.images.insert(
        "wide.png",
        ImageInfo {
            width: 800,
            height: 600,
            media_type: "image/png".to_string(),
            data: vec![0u8; 16],
        },
    );
    let options = Options {
        screen_width: 1280,
        ..Options::default()
    };
    let result = convert(&document, None, &options);

    let entries = storyline_entries(&result.fragments);
    assert_eq!(entries.len(), 3);
    let image = &entries[1];
    assert_eq!(image.get(Sym::TypeField), Some(&Value::Symbol(Sym::TypeImage)));

    let props = style_props(&result.fragments, image);
    assert_eq!(
        format_decimal(props.get_dimension(Sym::Width).unwrap().value),
        "62.500"
    );
    assert_eq!(props.get(Sym::BoxAlign), Some(&Value::Symbol(Sym::Center)));
    assert_eq!(props.get(Sym::LineHeight), Some(&dim("1", Sym::Lh)));
    assert_eq!(props.get(Sym::MarginTop), Some(&dim("2.6", Sym::Lh)));
    assert_eq!(props.get(Sym::MarginBottom), Some(&dim("2.6", Sym::Lh)));

    // Resource fragments exist and the entry references them.
    assert_eq!(
        image.get(Sym::ResourceName),
        Some(&Value::SymbolByName("rsrc1".to_string()))
    );
    assert!(result.fragments.find(Sym::ExternalResource, "rsrc1").is_some());
    assert!(result.fragments.find(Sym::RawMedia, "rsrc1").is_some());
}

#[test]
fn missing_block_image_is_dropped_with_warning() {
    let xml = r##"<body><section>
        <p>Text</p>
        <image href="#gone.png" alt="Gone"/>
    </section></body>"##;
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, None, &Options::default());

    let entries = storyline_entries(&result.fragments);
    assert_eq!(entries.len(), 1);
    assert!(result.warnings.iter().any(|w| w.contains("gone.png")));
}

#[test]
fn inline_styles_and_external_links() {
    let xml = r#"<body><section>
        <p>Read <strong>this</strong> at <a href="https://example.com/x">the site</a>.</p>
    </section></body>"#;
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, None, &Options::default());

    let entries = storyline_entries(&result.fragments);
    let entry = &entries[0];
    assert_eq!(
        entry.get(Sym::Content),
        Some(&Value::String("Read this at the site.".to_string()))
    );

    let Some(Value::List(events)) = entry.get(Sym::StyleEvents) else {
        panic!("style events expected");
    };
    assert_eq!(events.len(), 2);

    let strong = events[0].as_struct().unwrap();
    assert_eq!(strong.get(Sym::Offset), Some(&Value::Int(5)));
    assert_eq!(strong.get(Sym::Length), Some(&Value::Int(4)));

    let link = events[1].as_struct().unwrap();
    assert_eq!(
        link.get(Sym::Anchor),
        Some(&Value::SymbolByName("anchor1".to_string()))
    );
    assert!(result.fragments.find(Sym::Anchor, "anchor1").is_some());
}

#[test]
fn generated_names_start_at_s1j_and_only_used_styles_emit() {
    let xml = r#"<body><section><p>One paragraph.</p></section></body>"#;
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, None, &Options::default());

    let style_names: Vec<&str> = result
        .fragments
        .of_type(Sym::Style)
        .map(|f| f.name.as_str())
        .collect();
    assert!(!style_names.is_empty());
    for name in &style_names {
        assert!(name.starts_with('s'), "emitted style {name} is interned");
    }
    assert!(style_names.contains(&"s1J"));

    // Base styles never referenced by content stay out of the output.
    assert!(result.fragments.find(Sym::Style, "p").is_none());
    assert!(result.fragments.find(Sym::Style, "kfx-unknown").is_none());
}

#[test]
fn display_none_class_suppresses_entries() {
    let xml = r#"<body><section>
        <p>Visible</p>
        <p style="service-note">Invisible</p>
    </section></body>"#;
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(
        &document,
        Some(".service-note { display: none }"),
        &Options::default(),
    );

    let entries = storyline_entries(&result.fragments);
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].get(Sym::Content),
        Some(&Value::String("Visible".to_string()))
    );
}

#[test]
fn adjacent_paragraph_margins_collapse() {
    let xml = r#"<body><section>
        <p style="spaced-below">First</p>
        <p style="spaced-above">Second</p>
    </section></body>"#;
    let css = ".spaced-below { margin-bottom: 2lh }\n.spaced-above { margin-top: 1lh }";
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, Some(css), &Options::default());

    let entries = storyline_entries(&result.fragments);
    let first = style_props(&result.fragments, &entries[0]);
    let second = style_props(&result.fragments, &entries[1]);

    assert!(first.get(Sym::MarginBottom).is_none());
    assert_eq!(second.get(Sym::MarginTop), Some(&dim("2", Sym::Lh)));
}

#[test]
fn every_emitted_text_style_has_line_height() {
    let xml = r#"<body><section>
        <title><p>T</p></title>
        <p>Plain</p>
        <p style="fancy">Styled</p>
    </section></body>"#;
    let css = ".fancy { text-align: center }";
    let document = fb2::parse_document(xml).unwrap();
    let result = convert(&document, Some(css), &Options::default());

    for entry in storyline_entries(&result.fragments) {
        if entry.get(Sym::TypeField) == Some(&Value::Symbol(Sym::TypeText)) {
            let props = style_props(&result.fragments, &entry);
            assert!(
                props.contains(Sym::LineHeight),
                "text style without line-height"
            );
        }
    }
}
