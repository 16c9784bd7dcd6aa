//! Content tree and margin collapsing.
//!
//! The traversal produces a flat list of content references plus a
//! container hierarchy. Afterwards this module assembles the virtual tree
//! and rewrites vertical margins the way KP3 does: wrapper margins move
//! onto first/last children, and adjacent sibling margins collapse to
//! their maximum. Every rewrite re-interns the touched style so emission
//! sees the new names.

use crate::kfx::symbol::Sym;
use crate::kfx::value::{Dimension, Value};
use crate::style::context::ContainerKind;
use crate::style::registry::StyleRegistry;
use crate::warn::Warnings;

/// What a content reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Text,
    Image,
}

/// Vertical margins mirrored out of a resolved style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Margins {
    pub top: Option<Dimension>,
    pub bottom: Option<Dimension>,
}

impl Margins {
    pub fn from_style(props: &crate::kfx::value::ValueMap) -> Self {
        Self {
            top: props.get_dimension(Sym::MarginTop).cloned(),
            bottom: props.get_dimension(Sym::MarginBottom).cloned(),
        }
    }
}

/// One emitted content entry.
#[derive(Debug, Clone)]
pub struct ContentRef {
    pub eid: u64,
    pub kind: RefKind,
    /// The style chain that produced the entry, for diagnostics.
    pub style_spec: String,
    /// Interned style name; rewritten by the collapser.
    pub style: String,
    pub margins: Margins,
    /// Indices of child refs, for wrapper entries.
    pub child_refs: Vec<usize>,
    /// The container this entry belongs to; `None` at the root.
    pub container_id: Option<u64>,
    pub entry_order: u64,
    /// Full-width standalone images keep fixed margins and never
    /// participate in collapsing.
    pub is_float_image: bool,
}

/// One container registered during traversal. Ids grow outward-in, so a
/// lower id is always the outer container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: u64,
    pub parent: Option<u64>,
    pub kind: ContainerKind,
    pub entry_order: u64,
}

/// The virtual tree built after traversal.
#[derive(Debug, Default)]
pub struct ContentTree {
    pub refs: Vec<ContentRef>,
    pub containers: Vec<ContainerInfo>,
}

/// A child slot in the assembled tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Ref(usize),
    Container(u64),
}

impl ContentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ref(&mut self, content_ref: ContentRef) -> usize {
        self.refs.push(content_ref);
        self.refs.len() - 1
    }

    pub fn add_container(&mut self, info: ContainerInfo) {
        debug_assert!(
            self.containers.last().is_none_or(|last| last.id < info.id),
            "container ids must ascend"
        );
        self.containers.push(info);
    }

    /// Children of a container (`None` = root), interleaving refs and
    /// sub-containers in entry order.
    fn children_of(&self, parent: Option<u64>) -> Vec<Child> {
        let mut children: Vec<(u64, Child)> = Vec::new();
        for (index, content_ref) in self.refs.iter().enumerate() {
            // Refs claimed by a wrapper appear through the wrapper.
            let claimed = self.refs.iter().any(|r| r.child_refs.contains(&index));
            if content_ref.container_id == parent && !claimed {
                children.push((content_ref.entry_order, Child::Ref(index)));
            }
        }
        for container in &self.containers {
            if container.parent == parent {
                children.push((container.entry_order, Child::Container(container.id)));
            }
        }
        // A container whose content all lives behind a wrapper has no
        // presence of its own and must not keep siblings apart.
        children.retain(|(_, child)| match child {
            Child::Container(id) => !self.children_of(Some(*id)).is_empty(),
            Child::Ref(_) => true,
        });
        children.sort_by_key(|(order, _)| *order);
        children.into_iter().map(|(_, child)| child).collect()
    }

    /// Run the collapsing pass.
    pub fn collapse(&mut self, registry: &mut StyleRegistry, warnings: &mut Warnings) {
        self.transfer_wrapper_margins(registry, warnings);
        self.collapse_container(None, registry, warnings);
        let ids: Vec<u64> = self.containers.iter().map(|c| c.id).collect();
        for id in ids {
            self.collapse_container(Some(id), registry, warnings);
        }
    }

    /// Move wrapper margins onto their first/last children.
    fn transfer_wrapper_margins(&mut self, registry: &mut StyleRegistry, warnings: &mut Warnings) {
        let wrappers: Vec<usize> = self
            .refs
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.child_refs.is_empty())
            .map(|(index, _)| index)
            .collect();

        for wrapper in wrappers {
            let (top, bottom, first, last) = {
                let w = &self.refs[wrapper];
                let first = w.child_refs.first().copied();
                let last = w.child_refs.last().copied();
                (w.margins.top.clone(), w.margins.bottom.clone(), first, last)
            };

            if let (Some(top), Some(first)) = (top, first)
                && !top.is_zero()
            {
                let child_top = max_margin(self.refs[first].margins.top.as_ref(), &top);
                self.set_margins(first, Some(child_top), None, registry, warnings);
                self.clear_margin(wrapper, Sym::MarginTop, registry, warnings);
            }
            if let (Some(bottom), Some(last)) = (bottom, last)
                && !bottom.is_zero()
            {
                let child_bottom = max_margin(self.refs[last].margins.bottom.as_ref(), &bottom);
                self.set_margins(last, None, Some(child_bottom), registry, warnings);
                self.clear_margin(wrapper, Sym::MarginBottom, registry, warnings);
            }
        }
    }

    /// Collapse adjacent sibling margins inside one container.
    fn collapse_container(
        &mut self,
        parent: Option<u64>,
        registry: &mut StyleRegistry,
        warnings: &mut Warnings,
    ) {
        let children = self.children_of(parent);
        for pair in children.windows(2) {
            let (above, below) = (pair[0], pair[1]);
            let Some(above_ref) = self.bottom_edge_ref(above) else { continue };
            let Some(below_ref) = self.top_edge_ref(below) else { continue };
            if self.refs[above_ref].is_float_image || self.refs[below_ref].is_float_image {
                continue;
            }

            let bottom = self.refs[above_ref].margins.bottom.clone();
            let top = self.refs[below_ref].margins.top.clone();
            let (Some(bottom), Some(top)) = (bottom, top) else { continue };
            if bottom.is_zero() || top.is_zero() {
                continue;
            }

            let collapsed = if bottom.unit == top.unit && bottom.value > top.value {
                bottom.clone()
            } else {
                top.clone()
            };
            self.set_margins(below_ref, Some(collapsed), None, registry, warnings);
            self.clear_margin(above_ref, Sym::MarginBottom, registry, warnings);
        }
    }

    /// The ref whose margin-bottom forms a child's bottom edge.
    fn bottom_edge_ref(&self, child: Child) -> Option<usize> {
        match child {
            Child::Ref(index) => {
                let r = &self.refs[index];
                match r.child_refs.last() {
                    Some(&last) => Some(last),
                    None => Some(index),
                }
            }
            Child::Container(id) => {
                let children = self.children_of(Some(id));
                self.bottom_edge_ref(*children.last()?)
            }
        }
    }

    /// The ref whose margin-top forms a child's top edge.
    fn top_edge_ref(&self, child: Child) -> Option<usize> {
        match child {
            Child::Ref(index) => {
                let r = &self.refs[index];
                match r.child_refs.first() {
                    Some(&first) => Some(first),
                    None => Some(index),
                }
            }
            Child::Container(id) => {
                let children = self.children_of(Some(id));
                self.top_edge_ref(*children.first()?)
            }
        }
    }

    /// Rewrite a ref's margins and re-intern its style.
    fn set_margins(
        &mut self,
        index: usize,
        top: Option<Dimension>,
        bottom: Option<Dimension>,
        registry: &mut StyleRegistry,
        warnings: &mut Warnings,
    ) {
        let style = self.refs[index].style.clone();
        let mut props = registry.resolved_properties(&style, warnings);
        if let Some(top) = top {
            self.refs[index].margins.top = Some(top.clone());
            props.set(Sym::MarginTop, Value::Dimension(top));
        }
        if let Some(bottom) = bottom {
            self.refs[index].margins.bottom = Some(bottom.clone());
            props.set(Sym::MarginBottom, Value::Dimension(bottom));
        }
        props.remove(Sym::StyleName);
        self.refs[index].style = registry.register_resolved(&props, warnings);
    }

    fn clear_margin(
        &mut self,
        index: usize,
        side: Sym,
        registry: &mut StyleRegistry,
        warnings: &mut Warnings,
    ) {
        let style = self.refs[index].style.clone();
        let mut props = registry.resolved_properties(&style, warnings);
        props.remove(side);
        props.remove(Sym::StyleName);
        match side {
            Sym::MarginTop => self.refs[index].margins.top = None,
            Sym::MarginBottom => self.refs[index].margins.bottom = None,
            _ => {}
        }
        self.refs[index].style = registry.register_resolved(&props, warnings);
    }
}

fn max_margin(existing: Option<&Dimension>, incoming: &Dimension) -> Dimension {
    match existing {
        Some(existing) if existing.unit == incoming.unit && existing.value > incoming.value => {
            existing.clone()
        }
        _ => incoming.clone(),
    }
}
