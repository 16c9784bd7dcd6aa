//! CSS declaration parsing.
//!
//! Converts declaration values into `(Sym, Value)` pairs. Shorthands
//! (`margin`, `padding`, `border`, `font`) expand into their longhands.
//! Anything that cannot be converted produces one warning and is dropped.

use cssparser::{Parser, Token};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::kfx::symbol::Sym;
use crate::kfx::value::{LINE_HEIGHT_SIG_FIGS, PERCENT_SIG_FIGS, Value, round_significant};
use crate::warn::Warnings;

/// A single parsed declaration, before rule-level filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDecl {
    /// A converted property.
    Prop(Sym, Value),
    /// `text-decoration: none` — kept or dropped depending on the element.
    TextDecorationNone,
    /// `display: none` — becomes the hidden flag when it is the whole rule.
    DisplayNone,
}

/// A simplified component value.
#[derive(Debug, Clone, PartialEq)]
enum Component {
    Number(Decimal),
    Dim(Decimal, String),
    Percent(Decimal),
    Ident(String),
    Str(String),
    Hash(String),
    Function(String, Vec<Component>),
    Delim(char),
}

/// Parse one declaration's value and convert it.
pub fn parse_declaration<'i>(
    name: &str,
    input: &mut Parser<'i, '_>,
    warnings: &mut Warnings,
) -> Vec<ParsedDecl> {
    let components = collect_components(input);
    convert_declaration(name, &components, warnings)
}

fn collect_components<'i>(input: &mut Parser<'i, '_>) -> Vec<Component> {
    let mut components = Vec::new();
    loop {
        // Clone so the parser can be re-borrowed for nested blocks.
        let token = match input.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Number { value, .. } => {
                components.push(Component::Number(decimal_from_css(value)));
            }
            Token::Dimension { value, unit, .. } => {
                components.push(Component::Dim(
                    decimal_from_css(value),
                    unit.to_string().to_ascii_lowercase(),
                ));
            }
            Token::Percentage { unit_value, .. } => {
                components.push(Component::Percent(decimal_from_css(unit_value * 100.0)));
            }
            Token::Ident(ident) => {
                components.push(Component::Ident(ident.to_string().to_ascii_lowercase()));
            }
            Token::QuotedString(s) => {
                components.push(Component::Str(s.to_string()));
            }
            Token::Hash(h) | Token::IDHash(h) => {
                components.push(Component::Hash(h.to_string().to_ascii_lowercase()));
            }
            Token::Function(name) => {
                let name = name.to_string().to_ascii_lowercase();
                let inner: Result<Vec<Component>, cssparser::ParseError<'i, ()>> =
                    input.parse_nested_block(|nested| Ok(collect_components(nested)));
                components.push(Component::Function(name, inner.unwrap_or_default()));
            }
            Token::Delim(c) => components.push(Component::Delim(c)),
            Token::Comma => components.push(Component::Delim(',')),
            _ => {}
        }
    }
    components
}

/// Convert a CSS number to an exact decimal.
///
/// Stylesheets in the wild carry at most a handful of significant figures,
/// so the shortest decimal rendering of the f32 token recovers the source
/// digits.
fn decimal_from_css(value: f32) -> Decimal {
    Decimal::from_str(&format!("{value}")).unwrap_or_default()
}

fn convert_declaration(
    name: &str,
    components: &[Component],
    warnings: &mut Warnings,
) -> Vec<ParsedDecl> {
    fn unsupported(warnings: &mut Warnings, name: &str, what: &str) {
        warnings.push(format!("css: unsupported {what} in '{name}'"));
    }

    let mut out = Vec::new();
    match name {
        "font-size" => {
            if let Some(dim) = length(components.first(), warnings) {
                out.push(ParsedDecl::Prop(Sym::FontSize, dim));
            } else {
                unsupported(warnings, name, "value");
            }
        }
        "font-weight" => match components.first() {
            Some(Component::Ident(kw)) => match kw.as_str() {
                "bold" | "bolder" => out.push(ParsedDecl::Prop(Sym::FontWeight, Value::Symbol(Sym::Bold))),
                "normal" | "lighter" => {
                    out.push(ParsedDecl::Prop(Sym::FontWeight, Value::Symbol(Sym::Normal)))
                }
                _ => unsupported(warnings, name, "keyword"),
            },
            Some(Component::Number(n)) => {
                let sym = if *n >= Decimal::from(600) { Sym::Bold } else { Sym::Normal };
                out.push(ParsedDecl::Prop(Sym::FontWeight, Value::Symbol(sym)));
            }
            _ => unsupported(warnings, name, "value"),
        },
        "font-style" => match keyword(components) {
            Some("italic") => out.push(ParsedDecl::Prop(Sym::FontStyle, Value::Symbol(Sym::Italic))),
            Some("oblique") => out.push(ParsedDecl::Prop(Sym::FontStyle, Value::Symbol(Sym::Oblique))),
            Some("normal") => out.push(ParsedDecl::Prop(Sym::FontStyle, Value::Symbol(Sym::Normal))),
            _ => unsupported(warnings, name, "value"),
        },
        "font-family" => {
            if let Some(family) = first_family(components) {
                out.push(ParsedDecl::Prop(Sym::FontFamily, Value::String(family)));
            } else {
                unsupported(warnings, name, "value");
            }
        }
        "font" => {
            out.extend(expand_font_shorthand(components, warnings));
        }
        "line-height" => match components.first() {
            Some(Component::Number(n)) => {
                out.push(ParsedDecl::Prop(
                    Sym::LineHeight,
                    Value::dimension(round_significant(*n, LINE_HEIGHT_SIG_FIGS), Sym::Ratio),
                ));
            }
            other => {
                if let Some(dim) = length(other, warnings) {
                    out.push(ParsedDecl::Prop(Sym::LineHeight, dim));
                } else {
                    unsupported(warnings, name, "value");
                }
            }
        },
        "text-align" => match keyword(components) {
            Some("left") => out.push(ParsedDecl::Prop(Sym::TextAlign, Value::Symbol(Sym::Left))),
            Some("right") => out.push(ParsedDecl::Prop(Sym::TextAlign, Value::Symbol(Sym::Right))),
            Some("center") => out.push(ParsedDecl::Prop(Sym::TextAlign, Value::Symbol(Sym::Center))),
            Some("justify") => out.push(ParsedDecl::Prop(Sym::TextAlign, Value::Symbol(Sym::Justify))),
            _ => unsupported(warnings, name, "value"),
        },
        "text-indent" => {
            if let Some(dim) = length(components.first(), warnings) {
                out.push(ParsedDecl::Prop(Sym::TextIndent, dim));
            } else {
                unsupported(warnings, name, "value");
            }
        }
        "text-decoration" | "text-decoration-line" => {
            let mut any = false;
            for component in components {
                if let Component::Ident(kw) = component {
                    match kw.as_str() {
                        "underline" => {
                            out.push(ParsedDecl::Prop(Sym::Underline, Value::Bool(true)));
                            any = true;
                        }
                        "line-through" => {
                            out.push(ParsedDecl::Prop(Sym::Strikethrough, Value::Bool(true)));
                            any = true;
                        }
                        "none" => {
                            out.push(ParsedDecl::TextDecorationNone);
                            any = true;
                        }
                        _ => {}
                    }
                }
            }
            if !any {
                unsupported(warnings, name, "value");
            }
        }
        "text-transform" => match keyword(components) {
            Some("uppercase") => {
                out.push(ParsedDecl::Prop(Sym::TextTransform, Value::Symbol(Sym::Uppercase)))
            }
            Some("lowercase") => {
                out.push(ParsedDecl::Prop(Sym::TextTransform, Value::Symbol(Sym::Lowercase)))
            }
            Some("capitalize") => {
                out.push(ParsedDecl::Prop(Sym::TextTransform, Value::Symbol(Sym::Capitalize)))
            }
            Some("none") => out.push(ParsedDecl::Prop(Sym::TextTransform, Value::Symbol(Sym::None))),
            _ => unsupported(warnings, name, "value"),
        },
        "vertical-align" => match keyword(components) {
            Some("super") => {
                out.push(ParsedDecl::Prop(Sym::BaselineStyle, Value::Symbol(Sym::Superscript)))
            }
            Some("sub") => {
                out.push(ParsedDecl::Prop(Sym::BaselineStyle, Value::Symbol(Sym::Subscript)))
            }
            Some("baseline") => {
                out.push(ParsedDecl::Prop(Sym::BaselineStyle, Value::Symbol(Sym::Normal)))
            }
            Some("top") => out.push(ParsedDecl::Prop(Sym::BaselineStyle, Value::Symbol(Sym::Top))),
            Some("middle") => {
                out.push(ParsedDecl::Prop(Sym::BaselineStyle, Value::Symbol(Sym::Center)))
            }
            Some("bottom") => {
                out.push(ParsedDecl::Prop(Sym::BaselineStyle, Value::Symbol(Sym::Bottom)))
            }
            _ => unsupported(warnings, name, "value"),
        },
        "color" => {
            if let Some(color) = parse_color(components) {
                out.push(ParsedDecl::Prop(Sym::Color, Value::String(color)));
            } else {
                unsupported(warnings, name, "color");
            }
        }
        "background-color" => {
            if let Some(color) = parse_color(components) {
                out.push(ParsedDecl::Prop(Sym::BackgroundColor, Value::String(color)));
            } else {
                unsupported(warnings, name, "color");
            }
        }
        "background-repeat" => match keyword(components) {
            Some("repeat") => {
                out.push(ParsedDecl::Prop(Sym::BackgroundRepeat, Value::Symbol(Sym::Repeat)))
            }
            Some("repeat-x") => {
                out.push(ParsedDecl::Prop(Sym::BackgroundRepeat, Value::Symbol(Sym::RepeatX)))
            }
            Some("repeat-y") => {
                out.push(ParsedDecl::Prop(Sym::BackgroundRepeat, Value::Symbol(Sym::RepeatY)))
            }
            Some("no-repeat") => {
                out.push(ParsedDecl::Prop(Sym::BackgroundRepeat, Value::Symbol(Sym::NoRepeat)))
            }
            _ => unsupported(warnings, name, "value"),
        },
        "margin" => out.extend(expand_box_shorthand(
            [Sym::MarginTop, Sym::MarginRight, Sym::MarginBottom, Sym::MarginLeft],
            components,
            warnings,
        )),
        "padding" => out.extend(expand_box_shorthand(
            [Sym::PaddingTop, Sym::PaddingRight, Sym::PaddingBottom, Sym::PaddingLeft],
            components,
            warnings,
        )),
        "margin-top" | "margin-right" | "margin-bottom" | "margin-left" | "padding-top"
        | "padding-right" | "padding-bottom" | "padding-left" => {
            let sym = Sym::from_name(name).expect("box property name");
            match components.first() {
                Some(Component::Ident(kw)) if kw == "auto" => {
                    out.push(ParsedDecl::Prop(sym, Value::Symbol(Sym::Auto)));
                }
                other => {
                    if let Some(dim) = length(other, warnings) {
                        out.push(ParsedDecl::Prop(sym, dim));
                    } else {
                        unsupported(warnings, name, "value");
                    }
                }
            }
        }
        "width" | "height" | "min-width" | "min-height" | "max-width" | "max-height" => {
            let sym = Sym::from_name(name).expect("dimension property name");
            match components.first() {
                Some(Component::Ident(kw)) if kw == "auto" => {
                    out.push(ParsedDecl::Prop(sym, Value::Symbol(Sym::Auto)));
                }
                other => {
                    if let Some(dim) = length(other, warnings) {
                        out.push(ParsedDecl::Prop(sym, dim));
                    } else {
                        unsupported(warnings, name, "value");
                    }
                }
            }
        }
        "letter-spacing" | "word-spacing" => {
            let sym = if name == "letter-spacing" { Sym::LetterSpacing } else { Sym::WordSpacing };
            if let Some(dim) = length(components.first(), warnings) {
                out.push(ParsedDecl::Prop(sym, dim));
            } else {
                unsupported(warnings, name, "value");
            }
        }
        "white-space" => match keyword(components) {
            Some("nowrap") | Some("pre") => {
                out.push(ParsedDecl::Prop(Sym::WhiteSpace, Value::Symbol(Sym::Nowrap)))
            }
            Some("normal") => out.push(ParsedDecl::Prop(Sym::WhiteSpace, Value::Symbol(Sym::Normal))),
            _ => unsupported(warnings, name, "value"),
        },
        "display" => match keyword(components) {
            Some("none") => out.push(ParsedDecl::DisplayNone),
            Some("block") | Some("inline") => {}
            _ => unsupported(warnings, name, "value"),
        },
        // Forced breaks become intermediate markers; the style post-pass
        // turns them into yj-break properties.
        "page-break-before" => match keyword(components) {
            Some("always") | Some("left") | Some("right") | Some("page") => {
                out.push(ParsedDecl::Prop(Sym::KeepFirst, Value::Bool(true)))
            }
            Some("avoid") => {
                out.push(ParsedDecl::Prop(Sym::YjBreakBefore, Value::Symbol(Sym::Avoid)))
            }
            Some("auto") => {}
            _ => unsupported(warnings, name, "value"),
        },
        "page-break-after" => match keyword(components) {
            Some("always") | Some("left") | Some("right") | Some("page") => {
                out.push(ParsedDecl::Prop(Sym::KeepLast, Value::Bool(true)))
            }
            Some("avoid") => out.push(ParsedDecl::Prop(Sym::YjBreakAfter, Value::Symbol(Sym::Avoid))),
            Some("auto") => {}
            _ => unsupported(warnings, name, "value"),
        },
        "page-break-inside" => match keyword(components) {
            Some("avoid") => out.push(ParsedDecl::Prop(Sym::BreakInside, Value::Symbol(Sym::Avoid))),
            Some("auto") => {}
            _ => unsupported(warnings, name, "value"),
        },
        "box-align" => match keyword(components) {
            Some("center") => out.push(ParsedDecl::Prop(Sym::BoxAlign, Value::Symbol(Sym::Center))),
            Some("left") | Some("start") => {
                out.push(ParsedDecl::Prop(Sym::BoxAlign, Value::Symbol(Sym::Left)))
            }
            Some("right") | Some("end") => {
                out.push(ParsedDecl::Prop(Sym::BoxAlign, Value::Symbol(Sym::Right)))
            }
            _ => unsupported(warnings, name, "value"),
        },
        "border" => out.extend(expand_border_shorthand(components, warnings)),
        "border-width" => {
            if let Some(dim) = length(components.first(), warnings) {
                out.push(ParsedDecl::Prop(Sym::BorderWidth, dim));
            } else {
                unsupported(warnings, name, "value");
            }
        }
        "border-style" => match keyword(components) {
            Some("solid") => out.push(ParsedDecl::Prop(Sym::BorderStyle, Value::Symbol(Sym::Solid))),
            Some("none") | Some("hidden") => {
                out.push(ParsedDecl::Prop(Sym::BorderStyle, Value::Symbol(Sym::None)))
            }
            _ => unsupported(warnings, name, "value"),
        },
        "border-color" => {
            if let Some(color) = parse_color(components) {
                out.push(ParsedDecl::Prop(Sym::BorderColor, Value::String(color)));
            } else {
                unsupported(warnings, name, "color");
            }
        }
        "border-collapse" => match keyword(components) {
            Some("collapse") => {
                out.push(ParsedDecl::Prop(Sym::BorderCollapse, Value::Symbol(Sym::Collapse)))
            }
            Some("separate") => {
                out.push(ParsedDecl::Prop(Sym::BorderCollapse, Value::Symbol(Sym::None)))
            }
            _ => unsupported(warnings, name, "value"),
        },
        "border-spacing" => {
            let lengths: Vec<Value> = components
                .iter()
                .filter_map(|c| length(Some(c), warnings))
                .collect();
            match lengths.as_slice() {
                [both] => {
                    out.push(ParsedDecl::Prop(Sym::BorderSpacingHorizontal, both.clone()));
                    out.push(ParsedDecl::Prop(Sym::BorderSpacingVertical, both.clone()));
                }
                [h, v] => {
                    out.push(ParsedDecl::Prop(Sym::BorderSpacingHorizontal, h.clone()));
                    out.push(ParsedDecl::Prop(Sym::BorderSpacingVertical, v.clone()));
                }
                _ => unsupported(warnings, name, "value"),
            }
        }
        "float" => match keyword(components) {
            Some("left") => out.push(ParsedDecl::Prop(Sym::Float, Value::Symbol(Sym::Left))),
            Some("right") => out.push(ParsedDecl::Prop(Sym::Float, Value::Symbol(Sym::Right))),
            Some("none") => {}
            _ => unsupported(warnings, name, "value"),
        },
        _ => {
            warnings.push(format!("css: unrecognized property '{name}'"));
        }
    }

    out
}

fn keyword(components: &[Component]) -> Option<&str> {
    match components.first() {
        Some(Component::Ident(kw)) => Some(kw.as_str()),
        _ => None,
    }
}

/// Convert a length component into a `Dimension` value.
fn length(component: Option<&Component>, warnings: &mut Warnings) -> Option<Value> {
    match component? {
        Component::Number(n) => {
            if n.is_zero() {
                Some(Value::dimension(Decimal::ZERO, Sym::Px))
            } else {
                None
            }
        }
        Component::Percent(n) => Some(Value::dimension(
            round_significant(*n, PERCENT_SIG_FIGS),
            Sym::Percent,
        )),
        Component::Dim(n, unit) => {
            let unit_sym = match unit.as_str() {
                "em" => Sym::Em,
                "rem" => Sym::Rem,
                "px" => Sym::Px,
                "pt" => Sym::Pt,
                "cm" => Sym::Cm,
                "mm" => Sym::Mm,
                "lh" => Sym::Lh,
                "vh" => Sym::Vh,
                "vw" => Sym::Vw,
                other => {
                    warnings.push(format!("css: unknown unit '{other}'"));
                    return None;
                }
            };
            Some(Value::dimension(*n, unit_sym))
        }
        _ => None,
    }
}

fn first_family(components: &[Component]) -> Option<String> {
    for component in components {
        match component {
            Component::Str(s) => return Some(s.clone()),
            Component::Ident(kw) => return Some(kw.clone()),
            _ => {}
        }
    }
    None
}

fn parse_color(components: &[Component]) -> Option<String> {
    match components.first()? {
        Component::Hash(hex) => {
            let hex = hex.as_str();
            match hex.len() {
                3 => {
                    let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                    Some(format!("#{expanded}"))
                }
                6 => Some(format!("#{hex}")),
                _ => None,
            }
        }
        Component::Function(name, args) if name == "rgb" => {
            let channels: Vec<u8> = args
                .iter()
                .filter_map(|c| match c {
                    Component::Number(n) => u8::try_from(n.trunc().mantissa()).ok(),
                    _ => None,
                })
                .collect();
            match channels.as_slice() {
                [r, g, b] => Some(format!("#{r:02x}{g:02x}{b:02x}")),
                _ => None,
            }
        }
        Component::Ident(kw) => named_color(kw).map(str::to_string),
        _ => None,
    }
}

fn named_color(name: &str) -> Option<&'static str> {
    Some(match name {
        "black" => "#000000",
        "white" => "#ffffff",
        "red" => "#ff0000",
        "green" => "#008000",
        "blue" => "#0000ff",
        "gray" | "grey" => "#808080",
        "silver" => "#c0c0c0",
        "maroon" => "#800000",
        "navy" => "#000080",
        _ => return None,
    })
}

/// Expand a 1/2/3/4-value box shorthand. Sides are top, right, bottom, left.
fn expand_box_shorthand(
    sides: [Sym; 4],
    components: &[Component],
    warnings: &mut Warnings,
) -> Vec<ParsedDecl> {
    let values: Vec<Value> = components
        .iter()
        .filter_map(|c| match c {
            Component::Ident(kw) if kw == "auto" => Some(Value::Symbol(Sym::Auto)),
            other => length(Some(other), warnings),
        })
        .collect();

    let [top, right, bottom, left] = sides;
    let picked: Option<[(Sym, &Value); 4]> = match values.as_slice() {
        [a] => Some([(top, a), (right, a), (bottom, a), (left, a)]),
        [v, h] => Some([(top, v), (right, h), (bottom, v), (left, h)]),
        [t, h, b] => Some([(top, t), (right, h), (bottom, b), (left, h)]),
        [t, r, b, l] => Some([(top, t), (right, r), (bottom, b), (left, l)]),
        _ => None,
    };

    match picked {
        Some(entries) => entries
            .into_iter()
            .map(|(sym, value)| ParsedDecl::Prop(sym, value.clone()))
            .collect(),
        None => {
            warnings.push("css: bad box shorthand".to_string());
            Vec::new()
        }
    }
}

/// Expand `border: <width> <style> <color>` (any order, all optional).
fn expand_border_shorthand(components: &[Component], warnings: &mut Warnings) -> Vec<ParsedDecl> {
    let mut out = Vec::new();
    for component in components {
        match component {
            Component::Ident(kw) => match kw.as_str() {
                "solid" => out.push(ParsedDecl::Prop(Sym::BorderStyle, Value::Symbol(Sym::Solid))),
                "none" | "hidden" => {
                    out.push(ParsedDecl::Prop(Sym::BorderStyle, Value::Symbol(Sym::None)))
                }
                _ => {
                    if let Some(color) = named_color(kw) {
                        out.push(ParsedDecl::Prop(Sym::BorderColor, Value::String(color.to_string())));
                    }
                }
            },
            Component::Hash(_) => {
                if let Some(color) = parse_color(std::slice::from_ref(component)) {
                    out.push(ParsedDecl::Prop(Sym::BorderColor, Value::String(color)));
                }
            }
            other => {
                if let Some(dim) = length(Some(other), warnings) {
                    out.push(ParsedDecl::Prop(Sym::BorderWidth, dim));
                }
            }
        }
    }
    out
}

/// Expand `font: [style] [weight] size[/line-height] family`.
fn expand_font_shorthand(components: &[Component], warnings: &mut Warnings) -> Vec<ParsedDecl> {
    let mut out = Vec::new();
    let mut saw_size = false;

    let mut i = 0;
    while i < components.len() {
        match &components[i] {
            Component::Ident(kw) => match kw.as_str() {
                "italic" | "oblique" => {
                    let sym = if kw == "italic" { Sym::Italic } else { Sym::Oblique };
                    out.push(ParsedDecl::Prop(Sym::FontStyle, Value::Symbol(sym)));
                }
                "bold" | "bolder" => {
                    out.push(ParsedDecl::Prop(Sym::FontWeight, Value::Symbol(Sym::Bold)));
                }
                "normal" => {}
                family if saw_size => {
                    out.push(ParsedDecl::Prop(Sym::FontFamily, Value::String(family.to_string())));
                    break;
                }
                _ => {}
            },
            Component::Str(family) if saw_size => {
                out.push(ParsedDecl::Prop(Sym::FontFamily, Value::String(family.clone())));
                break;
            }
            other => {
                if let Some(dim) = length(Some(other), warnings) {
                    if !saw_size {
                        out.push(ParsedDecl::Prop(Sym::FontSize, dim));
                        saw_size = true;
                        // A following "/ line-height" pair.
                        if let (Some(Component::Delim('/')), Some(height)) =
                            (components.get(i + 1), components.get(i + 2))
                        {
                            match height {
                                Component::Number(n) => out.push(ParsedDecl::Prop(
                                    Sym::LineHeight,
                                    Value::dimension(*n, Sym::Ratio),
                                )),
                                _ => {
                                    if let Some(lh) = length(Some(height), warnings) {
                                        out.push(ParsedDecl::Prop(Sym::LineHeight, lh));
                                    }
                                }
                            }
                            i += 2;
                        }
                    }
                }
            }
        }
        i += 1;
    }

    if out.is_empty() {
        warnings.push("css: unsupported font shorthand".to_string());
    }
    out
}
