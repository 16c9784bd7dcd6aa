//! Storyline construction.
//!
//! Walks an FB2 document with a style registry and produces the KFX
//! fragment list: one storyline of content entries, a style fragment per
//! used style, resource fragments per image, and anchors for external
//! links. This is where the cascade, the container stack, and the margin
//! collapser meet.

use std::collections::HashMap;

use crate::fb2::{
    Annotation, BlockImage, BlockItem, Body, Cite, Document, Epigraph, Paragraph, Poem, Run,
    Section, Title, TitleLine,
};
use crate::kfx::fragment::{Fragment, FragmentList};
use crate::kfx::symbol::Sym;
use crate::kfx::value::{Dimension, Value, ValueMap};
use crate::layout::images::{block_image_style, inline_image_style};
use crate::layout::tree::{ContainerInfo, ContentRef, ContentTree, Margins, RefKind};
use crate::options::Options;
use crate::style::context::{ContainerFrame, ContainerKind, LayoutState, StyleContext};
use crate::style::defaults::default_registry;
use crate::style::postprocess::postprocess_styles;
use crate::style::registry::{StyleDef, StyleRegistry};
use crate::warn::Warnings;
use crate::css::Stylesheet;

/// The result of one conversion pass.
#[derive(Debug)]
pub struct Conversion {
    pub fragments: FragmentList,
    pub warnings: Vec<String>,
}

/// Convert a document. `css` overrides the document's embedded
/// stylesheet when given.
pub fn convert(document: &Document, css: Option<&str>, options: &Options) -> Conversion {
    let mut warnings = Warnings::new();
    let mut registry = default_registry();

    // The body carries the default line-height; author CSS may override.
    registry.register(
        StyleDef::new("body").with(
            Sym::LineHeight,
            Value::Dimension(options.default_line_height.clone()),
        ),
    );

    let css_text = css.or(document.stylesheet.as_deref());
    if let Some(text) = css_text {
        let sheet = Stylesheet::parse(text, &mut warnings);
        registry.apply_stylesheet(&sheet);
    }
    postprocess_styles(&mut registry);

    let mut walker = Walker::new(document, registry, options, warnings);
    walker.walk();
    walker.finish()
}

/// Per-entry payload, parallel to the content tree's refs.
#[derive(Debug)]
enum EntryContent {
    Text {
        text: String,
        events: Vec<StyleEvent>,
    },
    Image {
        resource: String,
        alt: Option<String>,
    },
    Wrapper,
}

#[derive(Debug)]
struct StyleEvent {
    offset: usize,
    length: usize,
    style: String,
    anchor: Option<String>,
}

struct Walker<'a> {
    document: &'a Document,
    registry: StyleRegistry,
    layout: LayoutState,
    tree: ContentTree,
    entries: Vec<EntryContent>,
    options: &'a Options,
    warnings: Warnings,
    resource_names: HashMap<String, String>,
    /// Ids of the containers the walk is currently inside, outer first.
    container_path: Vec<u64>,
    next_eid: u64,
    next_entry_order: u64,
    next_container_id: u64,
}

impl<'a> Walker<'a> {
    fn new(
        document: &'a Document,
        registry: StyleRegistry,
        options: &'a Options,
        warnings: Warnings,
    ) -> Self {
        // Resource numbering follows the lexicographic id order.
        let resource_names: HashMap<String, String> = document
            .images
            .sorted_ids()
            .enumerate()
            .map(|(index, id)| (id.to_string(), format!("rsrc{}", index + 1)))
            .collect();

        Self {
            document,
            registry,
            layout: LayoutState::new(),
            tree: ContentTree::new(),
            entries: Vec::new(),
            options,
            warnings,
            resource_names,
            container_path: Vec::new(),
            next_eid: 0,
            next_entry_order: 0,
            next_container_id: 0,
        }
    }

    fn walk(&mut self) {
        for body in &self.document.bodies {
            self.walk_body(body);
        }
    }

    // ------------------------------------------------------------------
    // Identifier allocation
    // ------------------------------------------------------------------

    fn next_eid(&mut self) -> u64 {
        self.next_eid += 1;
        self.next_eid
    }

    fn next_entry_order(&mut self) -> u64 {
        self.next_entry_order += 1;
        self.next_entry_order
    }

    fn current_container(&self) -> Option<u64> {
        self.container_path.last().copied()
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    fn enter(&mut self, kind: ContainerKind, style: &str, item_count: usize, is_last: bool) {
        let props = self.registry.resolve_inheritance(style, &mut self.warnings);
        let frame = ContainerFrame::new(kind)
            .with_margins(
                props.get_dimension(Sym::MarginTop).cloned(),
                props.get_dimension(Sym::MarginBottom).cloned(),
            )
            .with_items(item_count);
        self.enter_frame(frame, is_last);
    }

    fn enter_frame(&mut self, mut frame: ContainerFrame, is_last: bool) {
        frame.is_last_in_parent = is_last;
        self.next_container_id += 1;
        let id = self.next_container_id;
        let parent = self.container_path.last().copied();
        let entry_order = self.next_entry_order();
        self.tree.add_container(ContainerInfo {
            id,
            parent,
            kind: frame.kind,
            entry_order,
        });
        self.container_path.push(id);
        self.layout.enter_container(frame);
    }

    fn exit(&mut self) {
        self.container_path.pop();
        self.layout.exit_container(&mut self.warnings);
    }

    // ------------------------------------------------------------------
    // Bodies and sections
    // ------------------------------------------------------------------

    fn walk_body(&mut self, body: &Body) {
        let context = StyleContext::new().push(
            &mut self.registry,
            "body",
            &[],
            &mut self.warnings,
        );

        if let Some(title) = &body.title {
            self.walk_title(&context, title, "body-title", "h1");
        }
        for epigraph in &body.epigraphs {
            self.walk_epigraph(&context, epigraph, false);
        }
        let count = body.sections.len();
        for (index, section) in body.sections.iter().enumerate() {
            let footnotes = body.is_notes();
            self.walk_section(&context, section, 1, index + 1 == count, footnotes);
        }
    }

    fn walk_section(
        &mut self,
        context: &StyleContext,
        section: &Section,
        depth: usize,
        is_last: bool,
        footnotes: bool,
    ) {
        let context = context.push_block(&mut self.registry, "section", &mut self.warnings);
        let kind = if footnotes {
            ContainerKind::Footnote
        } else {
            ContainerKind::Section
        };
        self.enter(kind, "section", section_item_count(section), is_last);

        if let Some(title) = &section.title {
            let heading = format!("h{}", depth.min(6));
            let wrapper = if footnotes { "footnote-title" } else { "section-title" };
            self.walk_title(&context, title, wrapper, &heading);
            self.layout.advance_item();
        }
        for epigraph in &section.epigraphs {
            self.walk_epigraph(&context, epigraph, false);
            self.layout.advance_item();
        }
        if let Some(annotation) = &section.annotation {
            self.walk_annotation(&context, annotation);
            self.layout.advance_item();
        }
        for item in &section.items {
            self.walk_block_item(&context, item, &[]);
        }
        let count = section.sections.len();
        for (index, nested) in section.sections.iter().enumerate() {
            self.walk_section(&context, nested, depth + 1, index + 1 == count, footnotes);
            self.layout.advance_item();
        }

        self.exit();
    }

    // ------------------------------------------------------------------
    // Titles
    // ------------------------------------------------------------------

    /// A title emits a wrapper entry whose children are the title lines.
    /// The wrapper's margins distribute in title-block mode.
    fn walk_title(&mut self, context: &StyleContext, title: &Title, wrapper: &str, heading: &str) {
        self.registry.ensure_base_style(wrapper);
        let wrapper_name =
            self.registry
                .resolve_style(wrapper, None, &mut self.warnings);
        let wrapper_props = self
            .registry
            .resolved_properties(&wrapper_name, &mut self.warnings);

        let wrapper_order = self.next_entry_order();
        let frame = ContainerFrame::new(ContainerKind::TitleBlock)
            .with_margins(
                wrapper_props.get_dimension(Sym::MarginTop).cloned(),
                wrapper_props.get_dimension(Sym::MarginBottom).cloned(),
            )
            .with_items(title.paragraph_count());
        self.enter_frame(frame, false);

        let header_class = format!("{wrapper}-header");
        let title_context =
            context.push(&mut self.registry, "", &[wrapper], &mut self.warnings);

        let mut children = Vec::new();
        for line in &title.lines {
            match line {
                TitleLine::Paragraph(paragraph) => {
                    if let Some(index) = self.emit_paragraph(
                        &title_context,
                        heading,
                        &[header_class.as_str()],
                        paragraph,
                    ) {
                        children.push(index);
                        self.layout.advance_item();
                    }
                }
                TitleLine::EmptyLine => self.deposit_empty_line(),
            }
        }
        self.exit();

        let container = self.current_container();
        let eid = self.next_eid();
        let index = self.tree.push_ref(ContentRef {
            eid,
            kind: RefKind::Text,
            style_spec: wrapper.to_string(),
            style: wrapper_name,
            margins: Margins::from_style(&wrapper_props),
            child_refs: children,
            container_id: container,
            entry_order: wrapper_order,
            is_float_image: false,
        });
        self.entries.push(EntryContent::Wrapper);
        debug_assert_eq!(index + 1, self.entries.len());
    }

    // ------------------------------------------------------------------
    // Block containers
    // ------------------------------------------------------------------

    fn walk_epigraph(&mut self, context: &StyleContext, epigraph: &Epigraph, last: bool) {
        let context = context.push_block(&mut self.registry, "epigraph", &mut self.warnings);
        let count = emitted_count(&epigraph.items) + epigraph.authors.len();
        self.enter(ContainerKind::Epigraph, "epigraph", count, last);
        for item in &epigraph.items {
            self.walk_block_item(&context, item, &["epigraph"]);
        }
        for author in &epigraph.authors {
            if self.emit_paragraph(&context, "p", &["text-author"], author).is_some() {
                self.layout.advance_item();
            }
        }
        self.exit();
    }

    fn walk_annotation(&mut self, context: &StyleContext, annotation: &Annotation) {
        let context = context.push_block(&mut self.registry, "annotation", &mut self.warnings);
        self.enter(
            ContainerKind::Annotation,
            "annotation",
            emitted_count(&annotation.items),
            false,
        );
        for item in &annotation.items {
            self.walk_block_item(&context, item, &["annotation"]);
        }
        self.exit();
    }

    fn walk_poem(&mut self, context: &StyleContext, poem: &Poem) {
        let context = context.push_block(&mut self.registry, "poem", &mut self.warnings);
        let count = poem.title.is_some() as usize
            + poem.epigraphs.len()
            + poem.stanzas.len()
            + poem.authors.len();
        self.enter(ContainerKind::Poem, "poem", count, false);

        if let Some(title) = &poem.title {
            self.walk_title(&context, title, "poem-title", "p");
            self.layout.advance_item();
        }
        for epigraph in &poem.epigraphs {
            self.walk_epigraph(&context, epigraph, false);
            self.layout.advance_item();
        }
        for stanza in &poem.stanzas {
            let stanza_context =
                context.push_block(&mut self.registry, "stanza", &mut self.warnings);
            let verse_count = stanza.title.is_some() as usize + stanza.verses.len();
            self.enter(ContainerKind::Stanza, "stanza", verse_count, false);
            if let Some(title) = &stanza.title {
                self.walk_title(&stanza_context, title, "poem-title", "p");
                self.layout.advance_item();
            }
            for verse in &stanza.verses {
                if self
                    .emit_paragraph(&stanza_context, "p", &["verse"], verse)
                    .is_some()
                {
                    self.layout.advance_item();
                }
            }
            self.exit();
            self.layout.advance_item();
        }
        for author in &poem.authors {
            if self.emit_paragraph(&context, "p", &["text-author"], author).is_some() {
                self.layout.advance_item();
            }
        }
        self.exit();
    }

    fn walk_cite(&mut self, context: &StyleContext, cite: &Cite) {
        let context = context.push_block(&mut self.registry, "cite", &mut self.warnings);
        let count = emitted_count(&cite.items) + cite.authors.len();
        self.enter(ContainerKind::Cite, "cite", count, false);
        for item in &cite.items {
            self.walk_block_item(&context, item, &["cite"]);
        }
        for author in &cite.authors {
            if self.emit_paragraph(&context, "p", &["text-author"], author).is_some() {
                self.layout.advance_item();
            }
        }
        self.exit();
    }

    fn walk_block_item(&mut self, context: &StyleContext, item: &BlockItem, classes: &[&str]) {
        match item {
            BlockItem::Paragraph(paragraph) => {
                if self.emit_paragraph(context, "p", classes, paragraph).is_some() {
                    self.layout.advance_item();
                }
            }
            BlockItem::Subtitle(paragraph) => {
                let mut with_subtitle: Vec<&str> = classes.to_vec();
                with_subtitle.push("subtitle");
                if self
                    .emit_paragraph(context, "p", &with_subtitle, paragraph)
                    .is_some()
                {
                    self.layout.advance_item();
                }
            }
            BlockItem::Poem(poem) => {
                self.walk_poem(context, poem);
                self.layout.advance_item();
            }
            BlockItem::Cite(cite) => {
                self.walk_cite(context, cite);
                self.layout.advance_item();
            }
            BlockItem::Table(table) => {
                self.emit_table(context, table);
                self.layout.advance_item();
            }
            BlockItem::Image(image) => {
                if self.emit_block_image(context, image) {
                    self.layout.advance_item();
                }
            }
            BlockItem::EmptyLine => self.deposit_empty_line(),
        }
    }

    // ------------------------------------------------------------------
    // Leaf emission
    // ------------------------------------------------------------------

    /// True when any named style for this element carries the hidden flag.
    fn is_hidden(&self, tag: &str, classes: &[&str]) -> bool {
        std::iter::once(tag)
            .chain(classes.iter().copied())
            .filter(|name| !name.is_empty())
            .any(|name| self.registry.get(name).is_some_and(|def| def.hidden))
    }

    fn emit_paragraph(
        &mut self,
        context: &StyleContext,
        tag: &str,
        classes: &[&str],
        paragraph: &Paragraph,
    ) -> Option<usize> {
        let mut all_classes: Vec<&str> = classes.to_vec();
        if let Some(style) = &paragraph.style {
            all_classes.push(style.as_str());
        }
        if self.is_hidden(tag, &all_classes) {
            return None;
        }

        let resolved = context.resolve(
            &mut self.registry,
            &mut self.layout,
            tag,
            &all_classes,
            &mut self.warnings,
        );

        let run_context = context.push(&mut self.registry, tag, &all_classes, &mut self.warnings);
        let mut text = String::new();
        let mut events = Vec::new();
        self.flatten_runs(&run_context, &paragraph.runs, &mut text, &mut events);

        let eid = self.next_eid();
        let entry_order = self.next_entry_order();
        let container = self.current_container();
        let spec = std::iter::once(tag)
            .chain(all_classes.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        let index = self.tree.push_ref(ContentRef {
            eid,
            kind: RefKind::Text,
            style_spec: spec,
            style: resolved.name.clone(),
            margins: Margins::from_style(&resolved.props),
            child_refs: Vec::new(),
            container_id: container,
            entry_order,
            is_float_image: false,
        });
        self.entries.push(EntryContent::Text { text, events });
        Some(index)
    }

    /// Walk inline runs, appending text and recording style events.
    fn flatten_runs(
        &mut self,
        context: &StyleContext,
        runs: &[Run],
        text: &mut String,
        events: &mut Vec<StyleEvent>,
    ) {
        for run in runs {
            match run {
                Run::Text(t) => text.push_str(t),
                Run::Strong(inner) => self.inline_span(context, "strong", &[], inner, None, text, events),
                Run::Emphasis(inner) => {
                    self.inline_span(context, "emphasis", &[], inner, None, text, events);
                }
                Run::Strikethrough(inner) => {
                    self.inline_span(context, "strike", &[], inner, None, text, events);
                }
                Run::Sub(inner) => self.inline_span(context, "", &["sub"], inner, None, text, events),
                Run::Sup(inner) => self.inline_span(context, "", &["sup"], inner, None, text, events),
                Run::Code(inner) => self.inline_span(context, "code", &[], inner, None, text, events),
                Run::Named { name, runs } => {
                    self.inline_span(context, "", &[name.as_str()], runs, None, text, events);
                }
                Run::Link { href, runs } => {
                    let anchor = if is_external_link(href) {
                        Some(self.registry.add_external_link(href))
                    } else {
                        None
                    };
                    self.inline_span(context, "a", &[], runs, anchor, text, events);
                }
                Run::Image { href, alt } => match self.document.images.get(href) {
                    Some(info) => {
                        let style = inline_image_style(
                            &mut self.registry,
                            info.width,
                            info.height,
                            &mut self.warnings,
                        );
                        let offset = text.chars().count();
                        text.push('\u{fffc}');
                        events.push(StyleEvent {
                            offset,
                            length: 1,
                            style,
                            anchor: None,
                        });
                    }
                    None => {
                        // Missing inline images fall back to their alt text.
                        if let Some(alt) = alt {
                            text.push_str(alt);
                        }
                    }
                },
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn inline_span(
        &mut self,
        context: &StyleContext,
        tag: &str,
        classes: &[&str],
        runs: &[Run],
        anchor: Option<String>,
        text: &mut String,
        events: &mut Vec<StyleEvent>,
    ) {
        let resolved = context
            .resolve_inline(&mut self.registry, tag, classes, &mut self.warnings)
            .name;
        let offset = text.chars().count();
        let inner_context = context.push(&mut self.registry, tag, classes, &mut self.warnings);
        self.flatten_runs(&inner_context, runs, text, events);
        let length = text.chars().count() - offset;
        if length == 0 && anchor.is_none() {
            return;
        }
        events.push(StyleEvent {
            offset,
            length,
            style: resolved,
            anchor,
        });
    }

    /// Emit a block image entry; `false` when the resource is missing.
    fn emit_block_image(&mut self, context: &StyleContext, image: &BlockImage) -> bool {
        let Some(info) = self.document.images.get(&image.href) else {
            self.warnings
                .push(format!("image '{}' not found, entry dropped", image.href));
            return false;
        };

        let centered = context
            .inherited()
            .get(Sym::TextAlign)
            .and_then(Value::as_symbol)
            == Some(Sym::Center);
        let style = block_image_style(
            &mut self.registry,
            context,
            &ValueMap::new(),
            info.width,
            self.options,
            centered,
            true,
            &mut self.warnings,
        );

        let eid = self.next_eid();
        let entry_order = self.next_entry_order();
        let container = self.current_container();
        let resource = self
            .resource_names
            .get(image.href.trim_start_matches('#'))
            .cloned()
            .unwrap_or_default();
        self.tree.push_ref(ContentRef {
            eid,
            kind: RefKind::Image,
            style_spec: "image".to_string(),
            style: style.name,
            margins: Margins {
                top: style.props.get_dimension(Sym::MarginTop).cloned(),
                bottom: style.props.get_dimension(Sym::MarginBottom).cloned(),
            },
            child_refs: Vec::new(),
            container_id: container,
            entry_order,
            is_float_image: style.is_float,
        });
        self.entries.push(EntryContent::Image {
            resource,
            alt: image.alt.clone(),
        });
        true
    }

    /// Tables emit a wrapper whose children are the cell paragraphs.
    fn emit_table(&mut self, context: &StyleContext, table: &crate::fb2::Table) {
        let table_style = self
            .registry
            .resolve_style("table", None, &mut self.warnings);
        let table_props = self
            .registry
            .resolved_properties(&table_style, &mut self.warnings);

        let wrapper_order = self.next_entry_order();
        let mut children = Vec::new();
        for row in &table.rows {
            for cell in &row.cells {
                let tag = if cell.header { "th" } else { "td" };
                let paragraph = Paragraph {
                    id: None,
                    style: None,
                    runs: Vec::new(),
                };
                let Some(index) = self.emit_paragraph(context, tag, &[], &paragraph) else {
                    continue;
                };
                // Reuse the paragraph slot with the cell's actual runs.
                let run_context =
                    context.push(&mut self.registry, tag, &[], &mut self.warnings);
                let mut text = String::new();
                let mut events = Vec::new();
                self.flatten_runs(&run_context, &cell.runs, &mut text, &mut events);
                self.entries[index] = EntryContent::Text { text, events };
                children.push(index);
            }
        }

        let eid = self.next_eid();
        let container = self.current_container();
        self.tree.push_ref(ContentRef {
            eid,
            kind: RefKind::Text,
            style_spec: "table".to_string(),
            style: table_style,
            margins: Margins::from_style(&table_props),
            child_refs: children,
            container_id: container,
            entry_order: wrapper_order,
            is_float_image: false,
        });
        self.entries.push(EntryContent::Wrapper);
    }

    /// An empty line leaves no entry; its margin waits for the next block.
    fn deposit_empty_line(&mut self) {
        let props = self
            .registry
            .resolve_inheritance("emptyline", &mut self.warnings);
        if let Some(margin) = props.get_dimension(Sym::MarginTop) {
            let in_lh = match margin.unit {
                Sym::Em => Dimension::new(margin.value, Sym::Lh),
                _ => margin.clone(),
            };
            self.layout.set_pending_empty_line(in_lh);
        }
    }

    // ------------------------------------------------------------------
    // Fragment assembly
    // ------------------------------------------------------------------

    fn finish(mut self) -> Conversion {
        self.tree.collapse(&mut self.registry, &mut self.warnings);

        let mut content = FragmentList::new();
        content.push(self.storyline_fragment());
        for fragment in self.resource_fragments() {
            content.push(fragment);
        }
        for fragment in self.registry.anchor_fragments() {
            content.push(fragment);
        }

        self.registry.recompute_used_styles(&content);

        let mut fragments = FragmentList::new();
        for fragment in self.registry.style_fragments(&mut self.warnings) {
            fragments.push(fragment);
        }
        for fragment in content {
            fragments.push(fragment);
        }

        Conversion {
            fragments,
            warnings: self.warnings.take(),
        }
    }

    fn storyline_fragment(&self) -> Fragment {
        let claimed: std::collections::HashSet<usize> = self
            .tree
            .refs
            .iter()
            .flat_map(|r| r.child_refs.iter().copied())
            .collect();

        let mut top: Vec<usize> = (0..self.tree.refs.len())
            .filter(|index| !claimed.contains(index))
            .collect();
        top.sort_by_key(|&index| self.tree.refs[index].entry_order);

        let entries: Vec<Value> = top.into_iter().map(|index| self.entry_value(index)).collect();

        let mut fields = ValueMap::new();
        fields.set(Sym::StoryName, Value::SymbolByName("storyline1".to_string()));
        fields.set(Sym::Content, Value::List(entries));
        Fragment::new(Sym::Storyline, "storyline1", Value::Struct(fields))
    }

    fn entry_value(&self, index: usize) -> Value {
        let content_ref = &self.tree.refs[index];
        let mut fields = ValueMap::new();
        fields.set(Sym::Id, Value::Int(content_ref.eid as i64));
        fields.set(Sym::Style, Value::SymbolByName(content_ref.style.clone()));

        match &self.entries[index] {
            EntryContent::Text { text, events } => {
                fields.set(Sym::TypeField, Value::Symbol(Sym::TypeText));
                fields.set(Sym::Content, Value::String(text.clone()));
                if !events.is_empty() {
                    let values: Vec<Value> = events.iter().map(event_value).collect();
                    fields.set(Sym::StyleEvents, Value::List(values));
                }
            }
            EntryContent::Image { resource, alt } => {
                fields.set(Sym::TypeField, Value::Symbol(Sym::TypeImage));
                fields.set(Sym::ResourceName, Value::SymbolByName(resource.clone()));
                if let Some(alt) = alt {
                    fields.set(Sym::AltText, Value::String(alt.clone()));
                }
            }
            EntryContent::Wrapper => {
                fields.set(Sym::TypeField, Value::Symbol(Sym::TypeText));
                let children: Vec<Value> = content_ref
                    .child_refs
                    .iter()
                    .map(|&child| self.entry_value(child))
                    .collect();
                fields.set(Sym::Content, Value::List(children));
            }
        }
        Value::Struct(fields)
    }

    fn resource_fragments(&self) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        for id in self.document.images.sorted_ids() {
            let info = self.document.images.get(id).expect("id from index");
            let name = self.resource_names[id].clone();

            let mut fields = ValueMap::new();
            fields.set(Sym::ResourceName, Value::SymbolByName(name.clone()));
            fields.set(Sym::Format, Value::String(info.media_type.clone()));
            fields.set(Sym::ResourceWidth, Value::Int(info.width as i64));
            fields.set(Sym::ResourceHeight, Value::Int(info.height as i64));
            fields.set(Sym::Location, Value::String(name.clone()));
            fragments.push(Fragment::new(
                Sym::ExternalResource,
                name.clone(),
                Value::Struct(fields),
            ));
            fragments.push(Fragment::new(
                Sym::RawMedia,
                name,
                Value::Blob(info.data.clone()),
            ));
        }
        fragments
    }
}

fn event_value(event: &StyleEvent) -> Value {
    let mut fields = ValueMap::new();
    fields.set(Sym::Offset, Value::Int(event.offset as i64));
    fields.set(Sym::Length, Value::Int(event.length as i64));
    fields.set(Sym::Style, Value::SymbolByName(event.style.clone()));
    if let Some(anchor) = &event.anchor {
        fields.set(Sym::Anchor, Value::SymbolByName(anchor.clone()));
    }
    Value::Struct(fields)
}

/// Items that produce content entries (empty lines do not).
fn emitted_count(items: &[BlockItem]) -> usize {
    items
        .iter()
        .filter(|item| !matches!(item, BlockItem::EmptyLine))
        .count()
}

fn section_item_count(section: &Section) -> usize {
    section.title.is_some() as usize
        + section.epigraphs.len()
        + section.annotation.is_some() as usize
        + emitted_count(&section.items)
        + section.sections.len()
}

fn is_external_link(href: &str) -> bool {
    href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with("mailto:")
        || href.starts_with("ftp://")
}
