//! Style resolution context.
//!
//! A `StyleContext` carries everything the cascade needs at one point of
//! the content tree: the stack of ancestor scopes, the accumulated
//! inherited properties, and the record of which styles already
//! contributed horizontal margins. Contexts are values: `push` and
//! `push_block` return new contexts and leave the original usable, so a
//! traversal keeps one context per nesting level for free.
//!
//! Container bookkeeping (sibling counts, pending empty-line margins) is
//! traversal state, not scope state, and lives in [`LayoutState`].

use std::collections::{HashMap, HashSet};

use crate::kfx::symbol::Sym;
use crate::kfx::value::{Dimension, Value, ValueMap};
use crate::style::merge::{MergeContext, add_dimensions, merge_map, merge_property};
use crate::style::registry::{
    Position, PositionMode, StyleRegistry, apply_position_filter, strip_table_element_properties,
};
use crate::warn::Warnings;

/// One ancestor element: its tag and classes.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub tag: String,
    pub classes: Vec<String>,
}

impl Scope {
    /// Identifiers this scope answers to in combinator lookups.
    fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.tag.as_str())
            .filter(|tag| !tag.is_empty())
            .chain(self.classes.iter().map(String::as_str))
    }
}

/// Tracks which styles already contributed to an inherited margin side.
#[derive(Debug, Clone, Default)]
pub struct MarginOrigin {
    pub value: Option<Dimension>,
    pub contributors: HashSet<String>,
}

/// The kinds of block containers the traversal distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Root,
    TitleBlock,
    Poem,
    Stanza,
    Cite,
    Epigraph,
    Annotation,
    Footnote,
    Section,
}

/// Per-container traversal state for vertical margin distribution.
#[derive(Debug, Clone)]
pub struct ContainerFrame {
    pub kind: ContainerKind,
    pub margin_top: Option<Dimension>,
    pub margin_bottom: Option<Dimension>,
    pub item_count: usize,
    pub current_item: usize,
    /// Whether this container is itself the last item of its parent.
    pub is_last_in_parent: bool,
    /// Whether the container's parent is the root.
    pub top_level: bool,
    /// Title blocks distribute spacing through top margins.
    pub title_block_margins: bool,
}

impl ContainerFrame {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            margin_top: None,
            margin_bottom: None,
            item_count: 0,
            current_item: 0,
            is_last_in_parent: false,
            top_level: false,
            title_block_margins: kind == ContainerKind::TitleBlock,
        }
    }

    pub fn with_margins(
        mut self,
        top: Option<Dimension>,
        bottom: Option<Dimension>,
    ) -> Self {
        self.margin_top = top;
        self.margin_bottom = bottom;
        self
    }

    pub fn with_items(mut self, count: usize) -> Self {
        self.item_count = count;
        self
    }

    pub fn position(&self) -> Position {
        Position::from_index(self.current_item, self.item_count.max(1))
    }
}

/// Mutable traversal state: the container stack and the single pending
/// empty-line margin slot.
#[derive(Debug)]
pub struct LayoutState {
    stack: Vec<ContainerFrame>,
    pending_empty_line: Option<Dimension>,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutState {
    pub fn new() -> Self {
        Self {
            stack: vec![ContainerFrame::new(ContainerKind::Root)],
            pending_empty_line: None,
        }
    }

    pub fn enter_container(&mut self, mut frame: ContainerFrame) {
        frame.top_level = self.stack.len() == 1;
        self.stack.push(frame);
    }

    /// Pop the current container. An unmatched exit warns and leaves the
    /// stack untouched. Any unconsumed empty-line margin dies here.
    pub fn exit_container(&mut self, warnings: &mut Warnings) -> Option<ContainerFrame> {
        self.pending_empty_line = None;
        if self.stack.len() <= 1 {
            warnings.push("container exit without matching enter");
            return None;
        }
        self.stack.pop()
    }

    pub fn current(&self) -> Option<&ContainerFrame> {
        self.stack.last().filter(|frame| frame.kind != ContainerKind::Root)
    }

    pub fn current_mut(&mut self) -> Option<&mut ContainerFrame> {
        self.stack
            .last_mut()
            .filter(|frame| frame.kind != ContainerKind::Root)
    }

    pub fn advance_item(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.current_item += 1;
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Deposit an empty-line margin. The slot holds one value; a second
    /// deposit replaces the first.
    pub fn set_pending_empty_line(&mut self, margin: Dimension) {
        self.pending_empty_line = Some(margin);
    }

    pub fn take_pending_empty_line(&mut self) -> Option<Dimension> {
        self.pending_empty_line.take()
    }

    pub fn has_pending_empty_line(&self) -> bool {
        self.pending_empty_line.is_some()
    }
}

/// The result of resolving one element.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Interned style name.
    pub name: String,
    /// The final property map behind the name.
    pub props: ValueMap,
}

impl Resolved {
    pub fn margin_top(&self) -> Option<&Dimension> {
        self.props.get_dimension(Sym::MarginTop)
    }

    pub fn margin_bottom(&self) -> Option<&Dimension> {
        self.props.get_dimension(Sym::MarginBottom)
    }
}

/// The per-traversal style scope.
#[derive(Debug, Clone, Default)]
pub struct StyleContext {
    scopes: Vec<Scope>,
    inherited: ValueMap,
    margin_origins: HashMap<Sym, MarginOrigin>,
}

impl StyleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn inherited(&self) -> &ValueMap {
        &self.inherited
    }

    /// Enter an element scope, folding in its CSS-inherited properties.
    pub fn push(
        &self,
        registry: &mut StyleRegistry,
        tag: &str,
        classes: &[&str],
        warnings: &mut Warnings,
    ) -> StyleContext {
        let mut next = self.clone();
        let element = element_style(registry, tag, classes, warnings);
        for (property, value) in element.iter() {
            if property.is_css_inherited() {
                merge_property(&mut next.inherited, property, value, MergeContext::Inline);
            }
        }
        next.scopes.push(Scope {
            tag: tag.to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        });
        next
    }

    /// Enter a block container scope. Beyond CSS inheritance this folds
    /// the container's horizontal margins into the inherited map
    /// (cumulatively, so nested indents add up) and records the style as
    /// their origin.
    pub fn push_block(
        &self,
        registry: &mut StyleRegistry,
        style_name: &str,
        warnings: &mut Warnings,
    ) -> StyleContext {
        registry.ensure_base_style(style_name);
        let mut next = self.push(registry, "", &[style_name], warnings);
        let block = registry.resolve_inheritance(style_name, warnings);

        for side in [Sym::MarginLeft, Sym::MarginRight] {
            let Some(incoming) = block.get_dimension(side) else {
                continue;
            };
            let merged = match next.inherited.get_dimension(side) {
                Some(existing) => {
                    add_dimensions(existing, incoming).unwrap_or_else(|| incoming.clone())
                }
                None => incoming.clone(),
            };
            next.inherited.set(side, Value::Dimension(merged.clone()));
            let origin = next.margin_origins.entry(side).or_default();
            origin.value = Some(merged);
            origin.contributors.insert(style_name.to_string());
        }
        next
    }

    /// Resolve a block element: run the cascade, apply container margin
    /// distribution and any pending empty-line margin, and intern.
    pub fn resolve(
        &self,
        registry: &mut StyleRegistry,
        layout: &mut LayoutState,
        tag: &str,
        classes: &[&str],
        warnings: &mut Warnings,
    ) -> Resolved {
        let mut target = self.cascade(registry, tag, classes, warnings);

        if let Some(frame) = layout.current() {
            let frame = frame.clone();
            distribute_container_margins(&mut target, &frame);
        }
        if let Some(margin) = layout.take_pending_empty_line() {
            target.set(Sym::MarginTop, Value::Dimension(margin));
        }
        if tag == "table" {
            strip_table_element_properties(&mut target);
        }

        let name = registry.register_resolved(&target, warnings);
        let props = registry.resolved_properties(&name, warnings);
        Resolved { name, props }
    }

    /// Resolve an inline span (style event). Inline styles carry only
    /// their own effects: no inherited seed, no margins, no default
    /// line-height overlay.
    pub fn resolve_inline(
        &self,
        registry: &mut StyleRegistry,
        tag: &str,
        classes: &[&str],
        warnings: &mut Warnings,
    ) -> Resolved {
        let mut target = ValueMap::new();
        self.apply_tag_and_classes(registry, &mut target, tag, classes, false, warnings);
        let name = registry.register_resolved_inline(&target, warnings);
        Resolved { name, props: target }
    }

    /// The four cascade steps for a block element.
    fn cascade(
        &self,
        registry: &mut StyleRegistry,
        tag: &str,
        classes: &[&str],
        warnings: &mut Warnings,
    ) -> ValueMap {
        // Step 1: inherited seed.
        let mut target = ValueMap::new();
        merge_map(&mut target, &self.inherited, MergeContext::Inline);

        // Steps 2-4.
        self.apply_tag_and_classes(registry, &mut target, tag, classes, true, warnings);
        target
    }

    fn apply_tag_and_classes(
        &self,
        registry: &mut StyleRegistry,
        target: &mut ValueMap,
        tag: &str,
        classes: &[&str],
        block: bool,
        warnings: &mut Warnings,
    ) {
        // Step 2: universal and tag defaults.
        if registry.contains("*") {
            let universal = registry.resolve_inheritance("*", warnings);
            merge_map(target, &universal, MergeContext::Inline);
        }
        if !tag.is_empty() {
            registry.ensure_base_style(tag);
            let mut tag_props = registry.resolve_inheritance(tag, warnings);
            if block {
                self.filter_tag_zero_margins(&mut tag_props);
            }
            merge_map(target, &tag_props, MergeContext::Inline);
        }

        // Step 3: classes, with same-container margin accounting and
        // descendant replacement.
        let mut contributors: HashMap<Sym, HashSet<String>> = HashMap::new();
        for side in [Sym::MarginLeft, Sym::MarginRight] {
            if let Some(origin) = self.margin_origins.get(&side) {
                contributors.insert(side, origin.contributors.clone());
            }
        }
        let mut replaced: HashSet<&str> = HashSet::new();

        for class in classes {
            registry.ensure_base_style(class);

            if let Some(replacement) = self.replacement_for(registry, class) {
                let props = registry.resolve_inheritance(&replacement, warnings);
                merge_map(target, &props, MergeContext::ClassOverride);
                replaced.insert(*class);
                continue;
            }

            let mut props = registry.resolve_inheritance(class, warnings);

            if block {
                for side in [Sym::MarginLeft, Sym::MarginRight] {
                    let Some(incoming) = props.get_dimension(side).cloned() else {
                        continue;
                    };
                    props.remove(side);

                    let seen = contributors.entry(side).or_default();
                    if seen.contains(*class) {
                        // Already counted through the container chain.
                        continue;
                    }
                    let merged = match target.get_dimension(side) {
                        Some(existing) => {
                            add_dimensions(existing, &incoming).unwrap_or(incoming)
                        }
                        None => incoming,
                    };
                    target.set(side, Value::Dimension(merged));
                    seen.insert(class.to_string());
                }
            }

            merge_map(target, &props, MergeContext::ClassOverride);

            // Compound tag.class rules outrank the bare class.
            if !tag.is_empty() {
                let compound = format!("{tag}.{class}");
                if registry.contains(&compound) {
                    let props = registry.resolve_inheritance(&compound, warnings);
                    merge_map(target, &props, MergeContext::ClassOverride);
                }
            }
        }

        // Step 4: combinator overrides from the scope stack.
        self.apply_combinators(registry, target, tag, classes, &replaced, warnings);
    }

    /// Drop a tag's zero horizontal margin when the context already
    /// carries a non-zero one, so `p { margin-left: 0 }` cannot erase a
    /// container indent.
    fn filter_tag_zero_margins(&self, tag_props: &mut ValueMap) {
        for side in [Sym::MarginLeft, Sym::MarginRight] {
            let tag_zero = tag_props.get_dimension(side).is_some_and(|d| d.is_zero());
            let inherited_nonzero = self
                .inherited
                .get_dimension(side)
                .is_some_and(|d| !d.is_zero());
            if tag_zero && inherited_nonzero {
                tag_props.remove(side);
            }
        }
    }

    /// Find the `ancestor--class` replacement for a flagged class.
    fn replacement_for(&self, registry: &StyleRegistry, class: &str) -> Option<String> {
        if !registry.get(class)?.descendant_replacement {
            return None;
        }
        // Innermost ancestor wins.
        for scope in self.scopes.iter().rev() {
            for identifier in scope.identifiers() {
                let candidate = format!("{identifier}--{class}");
                if registry.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn apply_combinators(
        &self,
        registry: &mut StyleRegistry,
        target: &mut ValueMap,
        tag: &str,
        classes: &[&str],
        replaced: &HashSet<&str>,
        warnings: &mut Warnings,
    ) {
        let element_ids: Vec<&str> = std::iter::once(tag)
            .filter(|t| !t.is_empty())
            .chain(classes.iter().copied())
            .collect();

        // Direct children of the innermost scope.
        if let Some(innermost) = self.scopes.last() {
            for scope_id in innermost.identifiers() {
                for element_id in &element_ids {
                    let name = format!("{scope_id}>{element_id}");
                    if registry.contains(&name) {
                        let props = registry.resolve_inheritance(&name, warnings);
                        merge_map(target, &props, MergeContext::Inline);
                    }
                }
            }
        }

        // Descendant selectors for every ancestor, outermost first so
        // closer ancestors override.
        for scope in &self.scopes {
            for scope_id in scope.identifiers() {
                for element_id in &element_ids {
                    if replaced.contains(*element_id) {
                        continue;
                    }
                    let name = format!("{scope_id}--{element_id}");
                    if registry.contains(&name) {
                        let props = registry.resolve_inheritance(&name, warnings);
                        merge_map(target, &props, MergeContext::Inline);
                    }
                }
            }
        }
    }
}

/// Compute a plain element style (tag defaults + classes) for inheritance
/// folding.
fn element_style(
    registry: &mut StyleRegistry,
    tag: &str,
    classes: &[&str],
    warnings: &mut Warnings,
) -> ValueMap {
    let mut style = ValueMap::new();
    if !tag.is_empty() {
        registry.ensure_base_style(tag);
        let props = registry.resolve_inheritance(tag, warnings);
        merge_map(&mut style, &props, MergeContext::Inline);
    }
    for class in classes {
        registry.ensure_base_style(class);
        let props = registry.resolve_inheritance(class, warnings);
        merge_map(&mut style, &props, MergeContext::ClassOverride);
    }
    style
}

/// Apply the container's vertical margins to the element at its current
/// position.
fn distribute_container_margins(target: &mut ValueMap, frame: &ContainerFrame) {
    let position = frame.position();
    let positive = |margin: &Option<Dimension>| {
        margin
            .as_ref()
            .filter(|d| !d.is_zero() && !d.is_negative())
            .cloned()
    };

    if frame.title_block_margins {
        // Title blocks space through top margins; own bottoms drop.
        apply_position_filter(target, position, PositionMode::TitleBlock);
        match position {
            Position::First | Position::Only => {
                if let Some(top) = positive(&frame.margin_top) {
                    target.set(Sym::MarginTop, Value::Dimension(top));
                }
                if position == Position::Only
                    && let Some(bottom) = positive(&frame.margin_bottom)
                {
                    target.set(Sym::MarginBottom, Value::Dimension(bottom));
                }
            }
            Position::Middle => {}
            Position::Last => {
                if let Some(bottom) = positive(&frame.margin_bottom) {
                    target.set(Sym::MarginBottom, Value::Dimension(bottom));
                }
            }
        }
        return;
    }

    match position {
        Position::First | Position::Only => {
            if let Some(top) = positive(&frame.margin_top) {
                target.set(Sym::MarginTop, Value::Dimension(top));
            }
            if position == Position::Only {
                distribute_last_margin(target, frame, &positive);
            }
        }
        Position::Middle => {}
        Position::Last => distribute_last_margin(target, frame, &positive),
    }
}

fn distribute_last_margin(
    target: &mut ValueMap,
    frame: &ContainerFrame,
    positive: &impl Fn(&Option<Dimension>) -> Option<Dimension>,
) {
    if frame.top_level || !frame.is_last_in_parent {
        if let Some(bottom) = positive(&frame.margin_bottom) {
            target.set(Sym::MarginBottom, Value::Dimension(bottom));
        }
    }
}
