//! CSS stylesheet parsing.
//!
//! The FB2 converter understands a deliberate subset of CSS: tag and class
//! selectors, descendant and direct-child combinators, and the declaration
//! set that maps onto KFX style properties. Parsing is lenient; everything
//! unsupported is dropped with a warning.

pub mod parsing;

use cssparser::{
    AtRuleParser, ParseError, Parser, ParserInput, QualifiedRuleParser, RuleBodyItemParser,
    RuleBodyParser, StyleSheetParser,
};

use crate::kfx::symbol::Sym;
use crate::kfx::value::Value;
use crate::warn::Warnings;
use parsing::{ParsedDecl, parse_declaration};

/// Tags on which `text-decoration: none` is meaningful and preserved.
const DECORATION_CONTROL_TAGS: &[&str] = &["u", "a", "ins", "del", "s", "strike", "br"];

/// One compound selector: an optional tag and an optional class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleSelector {
    pub tag: Option<String>,
    pub class: Option<String>,
}

impl SimpleSelector {
    /// The registry name this selector binds to.
    pub fn name(&self) -> String {
        match (&self.tag, &self.class) {
            (Some(tag), Some(class)) => format!("{tag}.{class}"),
            (Some(tag), None) => tag.clone(),
            (None, Some(class)) => class.clone(),
            (None, None) => "*".to_string(),
        }
    }
}

/// A parsed selector, collapsed to at most two compound parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub parts: Vec<SimpleSelector>,
    /// True when the two parts are joined by `>` rather than descent.
    pub child: bool,
}

impl Selector {
    /// The style name this selector registers: `p`, `epigraph`,
    /// `poem--verse` for a descendant pair, `cite>p` for a child pair.
    pub fn style_name(&self) -> String {
        match self.parts.as_slice() {
            [single] => single.name(),
            [a, b] if self.child => format!("{}>{}", a.name(), b.name()),
            [a, b] => format!("{}--{}", a.name(), b.name()),
            _ => String::new(),
        }
    }

    /// The rightmost compound part (the element the rule applies to).
    pub fn leaf(&self) -> &SimpleSelector {
        self.parts.last().expect("selector has at least one part")
    }

    pub fn is_combinator(&self) -> bool {
        self.parts.len() == 2
    }
}

/// A converted CSS rule keyed by its registry style name.
#[derive(Debug, Clone)]
pub struct CssRule {
    pub selector: Selector,
    pub properties: Vec<(Sym, Value)>,
    /// Set when the rule's only declaration was `display: none`.
    pub hidden: bool,
}

/// A parsed stylesheet: rules in source order.
#[derive(Debug, Default)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

impl Stylesheet {
    /// Parse CSS text. Problems are reported into `warnings`; parsing never
    /// fails.
    pub fn parse(css: &str, warnings: &mut Warnings) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();

        let mut rule_parser = TopLevelRuleParser {
            rules: &mut rules,
            warnings,
        };
        let sheet_parser = StyleSheetParser::new(&mut parser, &mut rule_parser);
        for result in sheet_parser {
            // Malformed selectors warn in parse_prelude; everything else
            // recovers at the next rule boundary.
            let _ = result;
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parse a selector list prelude (`p, .cite > p`) into selectors.
fn parse_selector_list(text: &str, warnings: &mut Warnings) -> Vec<Selector> {
    text.split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            match parse_selector(part) {
                Some(selector) => Some(selector),
                None => {
                    warnings.push(format!("css: malformed selector '{part}'"));
                    None
                }
            }
        })
        .collect()
}

fn parse_selector(text: &str) -> Option<Selector> {
    // Surround `>` with spaces so it tokenizes on whitespace.
    let spaced = text.replace('>', " > ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let mut parts: Vec<SimpleSelector> = Vec::new();
    let mut child_joins: Vec<bool> = Vec::new();
    let mut pending_child = false;

    for token in tokens {
        if token == ">" {
            if parts.is_empty() || pending_child {
                return None;
            }
            pending_child = true;
            continue;
        }
        let part = parse_simple_selector(token)?;
        if !parts.is_empty() {
            child_joins.push(pending_child);
        }
        pending_child = false;
        parts.push(part);
    }
    if pending_child || parts.is_empty() {
        return None;
    }

    // Deeper chains collapse to the last two compound parts.
    if parts.len() > 2 {
        let keep = parts.split_off(parts.len() - 2);
        let child = *child_joins.last().unwrap_or(&false);
        return Some(Selector { parts: keep, child });
    }

    let child = child_joins.first().copied().unwrap_or(false);
    Some(Selector { parts, child })
}

fn parse_simple_selector(token: &str) -> Option<SimpleSelector> {
    if token == "*" {
        return Some(SimpleSelector::default());
    }

    let (tag, class) = match token.find('.') {
        Some(0) => (None, Some(&token[1..])),
        Some(pos) => (Some(&token[..pos]), Some(&token[pos + 1..])),
        None => (Some(token), None),
    };

    let valid = |ident: &str| {
        !ident.is_empty()
            && ident
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };

    if let Some(tag) = tag
        && !valid(tag)
    {
        return None;
    }
    if let Some(class) = class
        && !valid(class)
    {
        return None;
    }

    Some(SimpleSelector {
        tag: tag.map(|t| t.to_ascii_lowercase()),
        class: class.map(|c| c.to_string()),
    })
}

/// Filter one selector's declarations by its leaf element.
fn finish_rule(selector: Selector, declarations: &[ParsedDecl]) -> CssRule {
    let only_display_none =
        declarations.len() == 1 && declarations[0] == ParsedDecl::DisplayNone;

    let mut properties = Vec::new();
    for declaration in declarations {
        match declaration {
            ParsedDecl::Prop(sym, value) => properties.push((*sym, value.clone())),
            ParsedDecl::TextDecorationNone => {
                let keep = match &selector.leaf().tag {
                    Some(tag) => DECORATION_CONTROL_TAGS.contains(&tag.as_str()),
                    // Element unknown: preserve conservatively.
                    None => true,
                };
                if keep {
                    properties.push((Sym::Underline, Value::Bool(false)));
                    properties.push((Sym::Strikethrough, Value::Bool(false)));
                }
            }
            ParsedDecl::DisplayNone => {}
        }
    }

    CssRule {
        selector,
        properties,
        hidden: only_display_none,
    }
}

// ============================================================================
// cssparser plumbing
// ============================================================================

struct TopLevelRuleParser<'a> {
    rules: &'a mut Vec<CssRule>,
    warnings: &'a mut Warnings,
}

impl<'i> AtRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        // All at-rules (@media, @import, @font-face, ...) are skipped.
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = Vec<Selector>;
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next().is_ok() {}
        let text = input.slice_from(start).to_string();
        let selectors = parse_selector_list(&text, self.warnings);
        if selectors.is_empty() {
            return Err(input.new_custom_error(()));
        }
        Ok(selectors)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut declarations = Vec::new();
        let mut decl_parser = DeclarationListParser {
            declarations: &mut declarations,
            warnings: &mut *self.warnings,
        };
        for result in RuleBodyParser::new(input, &mut decl_parser) {
            // Recovery is handled inside the declaration parser.
            let _ = result;
        }

        for selector in prelude {
            self.rules.push(finish_rule(selector, &declarations));
        }
        Ok(())
    }
}

struct DeclarationListParser<'a> {
    declarations: &'a mut Vec<ParsedDecl>,
    warnings: &'a mut Warnings,
}

impl<'i> cssparser::DeclarationParser<'i> for DeclarationListParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &cssparser::ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let name = name.to_string().to_ascii_lowercase();
        let decls = parse_declaration(&name, input, self.warnings);
        self.declarations.extend(decls);
        Ok(())
    }
}

impl<'i> cssparser::AtRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> cssparser::QualifiedRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationListParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(css: &str) -> (Stylesheet, Warnings) {
        let mut warnings = Warnings::new();
        let sheet = Stylesheet::parse(css, &mut warnings);
        (sheet, warnings)
    }

    #[test]
    fn test_simple_rules() {
        let (sheet, warnings) = parse(
            ".para { line-height: 1.2; text-indent: 1.5em; text-align: justify; }\n\
             .emphasis { font-style: italic; }",
        );
        assert!(warnings.is_empty());
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].selector.style_name(), "para");
        assert_eq!(sheet.rules[0].properties.len(), 3);
        assert_eq!(sheet.rules[1].selector.style_name(), "emphasis");
        assert_eq!(
            sheet.rules[1].properties[0],
            (Sym::FontStyle, Value::Symbol(Sym::Italic))
        );
    }

    #[test]
    fn test_selector_list_splits() {
        let (sheet, _) = parse("p, .cite { margin-top: 1em; }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(sheet.rules[0].selector.style_name(), "p");
        assert_eq!(sheet.rules[1].selector.style_name(), "cite");
    }

    #[test]
    fn test_descendant_and_child_names() {
        let (sheet, _) = parse("h1 sub { vertical-align: sub; }\ncite > p { margin-left: 1em; }");
        assert_eq!(sheet.rules[0].selector.style_name(), "h1--sub");
        assert!(!sheet.rules[0].selector.child);
        assert_eq!(sheet.rules[1].selector.style_name(), "cite>p");
        assert!(sheet.rules[1].selector.child);
    }

    #[test]
    fn test_compound_selector() {
        let (sheet, _) = parse("p.verse { text-indent: 0; }");
        assert_eq!(sheet.rules[0].selector.style_name(), "p.verse");
    }

    #[test]
    fn test_deep_chain_collapses_to_last_two() {
        let (sheet, _) = parse("body section p { margin-top: 1em; }");
        assert_eq!(sheet.rules[0].selector.style_name(), "section--p");
    }

    #[test]
    fn test_display_none_only_sets_hidden() {
        let (sheet, _) = parse(".hidden-note { display: none; }");
        assert!(sheet.rules[0].hidden);
        assert!(sheet.rules[0].properties.is_empty());

        let (sheet, _) = parse(".half-hidden { display: none; color: #fff; }");
        assert!(!sheet.rules[0].hidden);
    }

    #[test]
    fn test_text_decoration_none_filter() {
        // `a` controls decoration: keep.
        let (sheet, _) = parse("a { text-decoration: none; }");
        assert_eq!(sheet.rules[0].properties.len(), 2);
        assert_eq!(sheet.rules[0].properties[0], (Sym::Underline, Value::Bool(false)));

        // `p` does not: drop.
        let (sheet, _) = parse("p { text-decoration: none; }");
        assert!(sheet.rules[0].properties.is_empty());

        // Class-only selector: element unknown, keep conservatively.
        let (sheet, _) = parse(".quiet-link { text-decoration: none; }");
        assert_eq!(sheet.rules[0].properties.len(), 2);
    }

    #[test]
    fn test_at_rules_skipped() {
        let (sheet, warnings) = parse("@media print { p { color: #000; } }\np { text-align: justify; }");
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(sheet.rules[0].selector.style_name(), "p");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_malformed_selector_warns() {
        let (sheet, warnings) = parse("p[href] { color: #000; }\np { text-align: left; }");
        assert_eq!(sheet.rules.len(), 1);
        assert!(!warnings.is_empty());
    }
}
