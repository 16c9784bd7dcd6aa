//! Style registry.
//!
//! Owns every style definition for one conversion, interns resolved
//! property maps under short generated names, tracks which styles content
//! actually references, and keeps the external-link anchor table.

use std::collections::{HashMap, HashSet};

use crate::css::Stylesheet;
use crate::kfx::fragment::{Fragment, FragmentList};
use crate::kfx::symbol::Sym;
use crate::kfx::value::{Value, ValueMap};
use crate::style::merge::{MergeContext, merge_map};
use crate::warn::Warnings;

/// Classes whose margins indent children instead of the element itself.
pub const CONTAINER_CLASSES: &[&str] =
    &["section", "cite", "epigraph", "poem", "stanza", "annotation"];

/// The style every registry starts with; it supplies the default
/// line-height beneath every interned style.
pub const UNKNOWN_STYLE: &str = "kfx-unknown";

/// How a style is referenced by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Text = 1,
    Image = 2,
    Wrapper = 4,
    Inline = 8,
}

/// A named style definition.
#[derive(Debug, Clone, Default)]
pub struct StyleDef {
    pub name: String,
    pub parent: Option<String>,
    pub properties: ValueMap,
    /// When set, a matching `ancestor--name` style replaces this one
    /// wholesale instead of merging over it.
    pub descendant_replacement: bool,
    /// Set by a rule whose only declaration was `display: none`.
    pub hidden: bool,
}

impl StyleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with(mut self, property: Sym, value: Value) -> Self {
        self.properties.set(property, value);
        self
    }
}

/// Position of an element among its container siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Middle,
    Last,
    Only,
}

impl Position {
    pub fn from_index(index: usize, count: usize) -> Self {
        match (index, count) {
            (_, 1) => Position::Only,
            (0, _) => Position::First,
            (i, n) if i + 1 == n => Position::Last,
            _ => Position::Middle,
        }
    }
}

/// Which flavor of position filtering applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMode {
    Standard,
    TitleBlock,
}

/// Remove the margins a sibling position does not keep. Idempotent.
pub fn apply_position_filter(props: &mut ValueMap, position: Position, mode: PositionMode) {
    match mode {
        PositionMode::Standard => match position {
            Position::First => {
                props.remove(Sym::MarginTop);
            }
            Position::Last => {
                props.remove(Sym::MarginBottom);
            }
            Position::Only => {
                props.remove(Sym::MarginTop);
                props.remove(Sym::MarginBottom);
            }
            Position::Middle => {}
        },
        // Title blocks space through top margins; bottoms always drop.
        PositionMode::TitleBlock => {
            props.remove(Sym::MarginBottom);
        }
    }
}

/// The registry.
#[derive(Debug)]
pub struct StyleRegistry {
    defs: Vec<StyleDef>,
    index: HashMap<String, usize>,
    /// Canonical signature of a resolved map → generated name.
    interned: HashMap<String, String>,
    /// Generated-name counter; pre-incremented, so the first name is
    /// `s1J` (55 in base 36).
    name_counter: u64,
    usage: HashMap<String, u8>,
    used: HashSet<String>,
    anchors: Vec<(String, String)>,
    anchor_index: HashMap<String, usize>,
    warned_cycles: HashSet<String>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            defs: Vec::new(),
            index: HashMap::new(),
            interned: HashMap::new(),
            name_counter: 54,
            usage: HashMap::new(),
            used: HashSet::new(),
            anchors: Vec::new(),
            anchor_index: HashMap::new(),
            warned_cycles: HashSet::new(),
        };
        registry.register(
            StyleDef::new(UNKNOWN_STYLE)
                .with(Sym::LineHeight, Value::dimension(1.into(), Sym::Lh)),
        );
        registry
    }

    // ------------------------------------------------------------------
    // Definition management
    // ------------------------------------------------------------------

    /// Insert a definition, or merge it onto the existing one of the same
    /// name. Merging applies class-override semantics so later
    /// declarations win the cascade; flags OR together; a non-empty
    /// incoming parent wins.
    pub fn register(&mut self, def: StyleDef) {
        match self.index.get(&def.name) {
            Some(&slot) => {
                let existing = &mut self.defs[slot];
                merge_map(&mut existing.properties, &def.properties, MergeContext::ClassOverride);
                existing.descendant_replacement |= def.descendant_replacement;
                existing.hidden |= def.hidden;
                if def.parent.is_some() {
                    existing.parent = def.parent;
                }
            }
            None => {
                self.index.insert(def.name.clone(), self.defs.len());
                self.defs.push(def);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&StyleDef> {
        self.index.get(name).map(|&slot| &self.defs[slot])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut StyleDef> {
        let slot = *self.index.get(name)?;
        Some(&mut self.defs[slot])
    }

    /// Names of all definitions, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.defs.iter().map(|def| def.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Definitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &StyleDef> {
        self.defs.iter()
    }

    /// Create a minimal placeholder for `name` if it is missing, wiring
    /// its parent by naming convention.
    pub fn ensure_base_style(&mut self, name: &str) {
        if self.contains(name) {
            return;
        }
        let parent = self.conventional_parent(name);
        let mut def = StyleDef::new(name);
        def.parent = parent;
        self.register(def);
    }

    fn conventional_parent(&self, name: &str) -> Option<String> {
        if CONTAINER_CLASSES.contains(&name) {
            return None;
        }
        for suffix in ["-first", "-next", "-break"] {
            if let Some(base) = name.strip_suffix(suffix)
                && self.contains(base)
            {
                return Some(base.to_string());
            }
        }
        if name.ends_with("-subtitle") && self.contains("subtitle") {
            return Some("subtitle".to_string());
        }
        Some(UNKNOWN_STYLE.to_string())
    }

    /// Load a parsed stylesheet into the registry.
    pub fn apply_stylesheet(&mut self, sheet: &Stylesheet) {
        for rule in &sheet.rules {
            let mut def = StyleDef::new(rule.selector.style_name());
            def.hidden = rule.hidden;
            for (property, value) in &rule.properties {
                def.properties.set(*property, value.clone());
            }
            self.register(def);
        }
    }

    // ------------------------------------------------------------------
    // Inheritance
    // ------------------------------------------------------------------

    /// Flatten a style's parent chain, root to child, simple override.
    /// Cycles break at the first repeated name, with one warning per
    /// cycle.
    pub fn resolve_inheritance(&mut self, name: &str, warnings: &mut Warnings) -> ValueMap {
        let mut chain: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = name.to_string();
        let mut cycle_at: Option<String> = None;

        loop {
            let Some(def) = self.get(&current) else { break };
            if !visited.insert(def.name.clone()) {
                cycle_at = Some(current.clone());
                break;
            }
            chain.push(def.name.clone());
            match &def.parent {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }

        if let Some(through) = cycle_at
            && self.warned_cycles.insert(name.to_string())
        {
            warnings.push(format!("style inheritance cycle through '{through}'"));
        }

        let mut resolved = ValueMap::new();
        for link in chain.iter().rev() {
            if let Some(def) = self.get(link) {
                for (property, value) in def.properties.iter() {
                    resolved.set(property, value.clone());
                }
            }
        }
        resolved
    }

    // ------------------------------------------------------------------
    // Interning
    // ------------------------------------------------------------------

    /// Intern a fully resolved property map, returning its generated
    /// name. The default style's resolved properties sit beneath the map
    /// so every emitted text style has a line-height; zero margins are
    /// stripped.
    pub fn register_resolved(&mut self, props: &ValueMap, warnings: &mut Warnings) -> String {
        let base = self.resolve_inheritance(UNKNOWN_STYLE, warnings);
        let mut merged = props.overlaid_on(&base);
        strip_zero_margins(&mut merged);

        let signature = Value::Struct(merged.clone()).signature();
        if let Some(existing) = self.interned.get(&signature) {
            return existing.clone();
        }

        let name = self.next_generated_name();
        self.interned.insert(signature, name.clone());
        let mut def = StyleDef::new(name.clone());
        def.properties = merged;
        self.register(def);
        name
    }

    /// Intern an inline-span style. Inline styles carry only their own
    /// effects, so the default-style overlay does not apply.
    pub fn register_resolved_inline(&mut self, props: &ValueMap, _warnings: &mut Warnings) -> String {
        let mut merged = props.clone();
        strip_zero_margins(&mut merged);

        let signature = Value::Struct(merged.clone()).signature();
        if let Some(existing) = self.interned.get(&signature) {
            return existing.clone();
        }

        let name = self.next_generated_name();
        self.interned.insert(signature, name.clone());
        let mut def = StyleDef::new(name.clone());
        def.properties = merged;
        self.register(def);
        name
    }

    fn next_generated_name(&mut self) -> String {
        self.name_counter += 1;
        format!("s{}", to_base36(self.name_counter))
    }

    /// Resolved properties of an interned (or any named) style.
    pub fn resolved_properties(&mut self, name: &str, warnings: &mut Warnings) -> ValueMap {
        self.resolve_inheritance(name, warnings)
    }

    // ------------------------------------------------------------------
    // Chain resolution
    // ------------------------------------------------------------------

    /// Resolve a space-separated chain of style names (`"p section
    /// section-subtitle"`): merge in order, strip container-class margins
    /// and table-element-only properties, apply the optional position
    /// filter, intern.
    pub fn resolve_style(
        &mut self,
        spec: &str,
        position: Option<(Position, PositionMode)>,
        warnings: &mut Warnings,
    ) -> String {
        let mut merged = ValueMap::new();
        let mut is_table = false;

        for name in spec.split_whitespace() {
            self.ensure_base_style(name);
            let mut resolved = self.resolve_inheritance(name, warnings);
            if name == "table" {
                is_table = true;
            }
            // Container-class margins indent children, not the element.
            if CONTAINER_CLASSES.contains(&name) {
                for side in Sym::MARGINS {
                    resolved.remove(side);
                }
            }
            merge_map(&mut merged, &resolved, MergeContext::ClassOverride);
        }

        if is_table {
            strip_table_element_properties(&mut merged);
        }
        if let Some((pos, mode)) = position {
            apply_position_filter(&mut merged, pos, mode);
        }

        self.register_resolved(&merged, warnings)
    }

    // ------------------------------------------------------------------
    // Usage tracking
    // ------------------------------------------------------------------

    pub fn mark_usage(&mut self, name: &str, usage: Usage) {
        *self.usage.entry(name.to_string()).or_insert(0) |= usage as u8;
        self.used.insert(name.to_string());
    }

    pub fn usage_of(&self, name: &str) -> u8 {
        self.usage.get(name).copied().unwrap_or(0)
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Clear usage and re-scan fragments for style references. This, not
    /// the inline marks, decides which styles appear in output.
    pub fn recompute_used_styles(&mut self, fragments: &FragmentList) {
        self.usage.clear();
        self.used.clear();

        for fragment in fragments.iter() {
            if fragment.ftype == Sym::Style {
                continue;
            }
            self.scan_value(&fragment.value);
        }
    }

    fn scan_value(&mut self, value: &Value) {
        match value {
            Value::Struct(map) => {
                if let Some(Value::SymbolByName(style)) = map.get(Sym::Style) {
                    let style = style.clone();
                    let usage = usage_of_entry(map);
                    self.mark_usage(&style, usage);
                }
                for (_, field) in map.iter() {
                    self.scan_value(field);
                }
            }
            Value::List(items) => {
                for item in items {
                    self.scan_value(item);
                }
            }
            _ => {}
        }
    }

    /// Emit one `style` fragment per used style, in definition order.
    pub fn style_fragments(&mut self, warnings: &mut Warnings) -> Vec<Fragment> {
        let names: Vec<String> = self
            .defs
            .iter()
            .filter(|def| self.used.contains(&def.name))
            .map(|def| def.name.clone())
            .collect();

        names
            .into_iter()
            .map(|name| {
                let mut props = self.resolve_inheritance(&name, warnings);
                strip_zero_margins(&mut props);
                props.set(Sym::StyleName, Value::SymbolByName(name.clone()));
                Fragment::new(Sym::Style, name, Value::Struct(props))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // External links
    // ------------------------------------------------------------------

    /// Register an external link target, returning its anchor name.
    pub fn add_external_link(&mut self, url: &str) -> String {
        if let Some(&slot) = self.anchor_index.get(url) {
            return self.anchors[slot].1.clone();
        }
        let name = format!("anchor{}", self.anchors.len() + 1);
        self.anchor_index.insert(url.to_string(), self.anchors.len());
        self.anchors.push((url.to_string(), name.clone()));
        name
    }

    /// Emit one `anchor` fragment per external link, in first-seen order.
    pub fn anchor_fragments(&self) -> Vec<Fragment> {
        self.anchors
            .iter()
            .map(|(url, name)| {
                let mut fields = ValueMap::new();
                fields.set(Sym::AnchorName, Value::SymbolByName(name.clone()));
                fields.set(Sym::ExternalUrl, Value::String(url.clone()));
                Fragment::new(Sym::Anchor, name.clone(), Value::Struct(fields))
            })
            .collect()
    }
}

fn usage_of_entry(map: &ValueMap) -> Usage {
    match map.get(Sym::TypeField).and_then(Value::as_symbol) {
        Some(Sym::TypeImage) => Usage::Image,
        Some(Sym::TypeText) => {
            if matches!(map.get(Sym::Content), Some(Value::List(_))) {
                Usage::Wrapper
            } else {
                Usage::Text
            }
        }
        _ => {
            if map.contains(Sym::Offset) {
                Usage::Inline
            } else {
                Usage::Text
            }
        }
    }
}

/// Remove `margin-*` entries whose measure is exactly zero.
pub fn strip_zero_margins(props: &mut ValueMap) {
    for side in Sym::MARGINS {
        if props.get_dimension(side).is_some_and(|d| d.is_zero()) {
            props.remove(side);
        }
    }
}

/// Table styles keep cell-level properties only; `border-collapse` and
/// `border-spacing-*` move to the table element.
pub fn strip_table_element_properties(props: &mut ValueMap) {
    props.remove(Sym::BorderCollapse);
    props.remove(Sym::BorderSpacingHorizontal);
    props.remove(Sym::BorderSpacingVertical);
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dim(v: &str, unit: Sym) -> Value {
        Value::dimension(Decimal::from_str(v).unwrap(), unit)
    }

    #[test]
    fn test_first_generated_name_is_s1j() {
        let mut registry = StyleRegistry::new();
        let mut warnings = Warnings::new();
        let mut props = ValueMap::new();
        props.set(Sym::TextAlign, Value::Symbol(Sym::Center));
        assert_eq!(registry.register_resolved(&props, &mut warnings), "s1J");
    }

    #[test]
    fn test_interning_is_deterministic() {
        let mut registry = StyleRegistry::new();
        let mut warnings = Warnings::new();

        let mut a = ValueMap::new();
        a.set(Sym::TextAlign, Value::Symbol(Sym::Center));
        a.set(Sym::FontSize, dim("2", Sym::Em));

        let mut b = ValueMap::new();
        b.set(Sym::FontSize, dim("2", Sym::Em));
        b.set(Sym::TextAlign, Value::Symbol(Sym::Center));

        let name_a = registry.register_resolved(&a, &mut warnings);
        let name_b = registry.register_resolved(&b, &mut warnings);
        assert_eq!(name_a, name_b);

        let mut c = ValueMap::new();
        c.set(Sym::TextAlign, Value::Symbol(Sym::Justify));
        let name_c = registry.register_resolved(&c, &mut warnings);
        assert_ne!(name_a, name_c);
        assert_eq!(name_c, "s1K");
    }

    #[test]
    fn test_interned_styles_carry_default_line_height() {
        let mut registry = StyleRegistry::new();
        let mut warnings = Warnings::new();
        let mut props = ValueMap::new();
        props.set(Sym::TextAlign, Value::Symbol(Sym::Center));
        let name = registry.register_resolved(&props, &mut warnings);
        let def = registry.get(&name).unwrap();
        assert_eq!(
            def.properties.get(Sym::LineHeight),
            Some(&dim("1", Sym::Lh))
        );
    }

    #[test]
    fn test_register_merges_same_name() {
        let mut registry = StyleRegistry::new();
        registry.register(
            StyleDef::new("para")
                .with(Sym::TextAlign, Value::Symbol(Sym::Left))
                .with(Sym::TextIndent, dim("1.5", Sym::Em)),
        );
        registry.register(StyleDef::new("para").with(Sym::TextAlign, Value::Symbol(Sym::Justify)));

        let def = registry.get("para").unwrap();
        assert_eq!(def.properties.get(Sym::TextAlign), Some(&Value::Symbol(Sym::Justify)));
        assert_eq!(def.properties.get(Sym::TextIndent), Some(&dim("1.5", Sym::Em)));
    }

    #[test]
    fn test_ensure_base_style_parent_conventions() {
        let mut registry = StyleRegistry::new();
        registry.register(StyleDef::new("vignette"));
        registry.register(StyleDef::new("subtitle"));

        registry.ensure_base_style("poem");
        assert_eq!(registry.get("poem").unwrap().parent, None);

        registry.ensure_base_style("vignette-first");
        assert_eq!(
            registry.get("vignette-first").unwrap().parent.as_deref(),
            Some("vignette")
        );

        registry.ensure_base_style("chapter-subtitle");
        assert_eq!(
            registry.get("chapter-subtitle").unwrap().parent.as_deref(),
            Some("subtitle")
        );

        registry.ensure_base_style("mystery");
        assert_eq!(
            registry.get("mystery").unwrap().parent.as_deref(),
            Some(UNKNOWN_STYLE)
        );
    }

    #[test]
    fn test_inheritance_cycle_breaks_with_one_warning() {
        let mut registry = StyleRegistry::new();
        registry.register(StyleDef::new("a").with_parent("b").with(Sym::FontSize, dim("1", Sym::Em)));
        registry.register(StyleDef::new("b").with_parent("a").with(Sym::FontSize, dim("2", Sym::Em)));

        let mut warnings = Warnings::new();
        let resolved = registry.resolve_inheritance("a", &mut warnings);
        assert_eq!(resolved.get(Sym::FontSize), Some(&dim("1", Sym::Em)));
        assert_eq!(warnings.len(), 1);

        // Second resolve of the same cycle stays quiet.
        let mut warnings2 = Warnings::new();
        registry.resolve_inheritance("a", &mut warnings2);
        assert!(warnings2.is_empty());
    }

    #[test]
    fn test_zero_margins_stripped() {
        let mut registry = StyleRegistry::new();
        let mut warnings = Warnings::new();
        let mut props = ValueMap::new();
        props.set(Sym::MarginTop, dim("0", Sym::Lh));
        props.set(Sym::MarginLeft, dim("2", Sym::Percent));
        let name = registry.register_resolved(&props, &mut warnings);
        let def = registry.get(&name).unwrap();
        assert!(!def.properties.contains(Sym::MarginTop));
        assert!(def.properties.contains(Sym::MarginLeft));
    }

    #[test]
    fn test_resolve_style_strips_table_properties() {
        let mut registry = StyleRegistry::new();
        registry.register(
            StyleDef::new("table")
                .with(Sym::BorderCollapse, Value::Symbol(Sym::Collapse))
                .with(Sym::BorderSpacingHorizontal, dim("2", Sym::Px))
                .with(Sym::TextAlign, Value::Symbol(Sym::Center)),
        );
        let mut warnings = Warnings::new();
        let name = registry.resolve_style("table", None, &mut warnings);
        let def = registry.get(&name).unwrap();
        assert!(!def.properties.contains(Sym::BorderCollapse));
        assert!(!def.properties.contains(Sym::BorderSpacingHorizontal));
        assert_eq!(def.properties.get(Sym::TextAlign), Some(&Value::Symbol(Sym::Center)));
    }

    #[test]
    fn test_position_filter_coverage_and_idempotence() {
        let make = || {
            let mut props = ValueMap::new();
            props.set(Sym::MarginTop, dim("1", Sym::Lh));
            props.set(Sym::MarginBottom, dim("2", Sym::Lh));
            props
        };

        let mut first = make();
        apply_position_filter(&mut first, Position::First, PositionMode::Standard);
        assert!(!first.contains(Sym::MarginTop));
        assert!(first.contains(Sym::MarginBottom));
        // Idempotent.
        let snapshot = first.clone();
        apply_position_filter(&mut first, Position::First, PositionMode::Standard);
        assert_eq!(first, snapshot);

        let mut last = make();
        apply_position_filter(&mut last, Position::Last, PositionMode::Standard);
        assert!(last.contains(Sym::MarginTop));
        assert!(!last.contains(Sym::MarginBottom));

        let mut only = make();
        apply_position_filter(&mut only, Position::Only, PositionMode::Standard);
        assert!(!only.contains(Sym::MarginTop));
        assert!(!only.contains(Sym::MarginBottom));

        let mut middle = make();
        apply_position_filter(&mut middle, Position::Middle, PositionMode::Standard);
        assert!(middle.contains(Sym::MarginTop));
        assert!(middle.contains(Sym::MarginBottom));
    }

    #[test]
    fn test_external_link_table() {
        let mut registry = StyleRegistry::new();
        let a = registry.add_external_link("https://example.com/a");
        let b = registry.add_external_link("https://example.com/b");
        let a_again = registry.add_external_link("https://example.com/a");
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(registry.anchor_fragments().len(), 2);
    }
}
