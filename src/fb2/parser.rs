//! FB2 XML reader.
//!
//! A streaming quick-xml parser that builds the [`Document`] model.
//! Unknown elements are skipped wholesale; the reader is lenient about
//! everything except well-formedness.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::Result;
use crate::fb2::{
    Annotation, BlockImage, BlockItem, Body, Cite, Document, Epigraph, Paragraph, Poem, Run,
    Section, Stanza, Table, TableCell, TableRow, Title, TitleLine,
};

/// Parse an FB2 document from XML text.
pub fn parse_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    let mut document = Document::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"body" => {
                    let body = parse_body(&mut reader, &e)?;
                    document.bodies.push(body);
                }
                b"stylesheet" => {
                    document.stylesheet = Some(read_text(&mut reader, b"stylesheet")?);
                }
                b"description" | b"binary" => {
                    reader.read_to_end(e.name())?;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(document)
}

fn parse_body(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Body> {
    let mut body = Body {
        name: attr(start, b"name"),
        ..Body::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"title" => body.title = Some(parse_title(reader)?),
                b"epigraph" => body.epigraphs.push(parse_epigraph(reader)?),
                b"section" => body.sections.push(parse_section(reader, &e)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if local(e.name().as_ref()) == b"body" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(body)
}

fn parse_title(reader: &mut Reader<&[u8]>) -> Result<Title> {
    let mut title = Title::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"p" => {
                    let paragraph = parse_paragraph(reader, &e, b"p")?;
                    title.lines.push(TitleLine::Paragraph(paragraph));
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) if local(e.name().as_ref()) == b"empty-line" => {
                title.lines.push(TitleLine::EmptyLine);
            }
            Event::End(e) if local(e.name().as_ref()) == b"title" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(title)
}

fn parse_section(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Section> {
    let mut section = Section {
        id: attr(start, b"id"),
        ..Section::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"title" => section.title = Some(parse_title(reader)?),
                b"epigraph" => section.epigraphs.push(parse_epigraph(reader)?),
                b"annotation" => section.annotation = Some(parse_annotation(reader)?),
                b"section" => {
                    let nested = parse_section(reader, &e)?;
                    section.sections.push(nested);
                }
                _ => {
                    if let Some(item) = parse_block_item(reader, &e)? {
                        section.items.push(item);
                    }
                }
            },
            Event::Empty(e) => {
                if let Some(item) = parse_empty_item(&e) {
                    section.items.push(item);
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"section" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(section)
}

/// Block items shared by sections, epigraphs, cites, annotations.
fn parse_block_item(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart<'_>,
) -> Result<Option<BlockItem>> {
    let item = match local(e.name().as_ref()) {
        b"p" => Some(BlockItem::Paragraph(parse_paragraph(reader, e, b"p")?)),
        b"subtitle" => Some(BlockItem::Subtitle(parse_paragraph(reader, e, b"subtitle")?)),
        b"poem" => Some(BlockItem::Poem(parse_poem(reader)?)),
        b"cite" => Some(BlockItem::Cite(parse_cite(reader)?)),
        b"table" => Some(BlockItem::Table(parse_table(reader)?)),
        b"image" => {
            // Non-empty image element: take attributes, skip content.
            let image = block_image(e);
            reader.read_to_end(e.name())?;
            Some(BlockItem::Image(image))
        }
        _ => {
            reader.read_to_end(e.name())?;
            None
        }
    };
    Ok(item)
}

fn parse_empty_item(e: &BytesStart<'_>) -> Option<BlockItem> {
    match local(e.name().as_ref()) {
        b"empty-line" => Some(BlockItem::EmptyLine),
        b"image" => Some(BlockItem::Image(block_image(e))),
        _ => None,
    }
}

fn parse_epigraph(reader: &mut Reader<&[u8]>) -> Result<Epigraph> {
    let mut epigraph = Epigraph::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"text-author" => {
                    epigraph
                        .authors
                        .push(parse_paragraph(reader, &e, b"text-author")?);
                }
                _ => {
                    if let Some(item) = parse_block_item(reader, &e)? {
                        epigraph.items.push(item);
                    }
                }
            },
            Event::Empty(e) => {
                if let Some(item) = parse_empty_item(&e) {
                    epigraph.items.push(item);
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"epigraph" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(epigraph)
}

fn parse_annotation(reader: &mut Reader<&[u8]>) -> Result<Annotation> {
    let mut annotation = Annotation::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(item) = parse_block_item(reader, &e)? {
                    annotation.items.push(item);
                }
            }
            Event::Empty(e) => {
                if let Some(item) = parse_empty_item(&e) {
                    annotation.items.push(item);
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"annotation" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(annotation)
}

fn parse_poem(reader: &mut Reader<&[u8]>) -> Result<Poem> {
    let mut poem = Poem::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"title" => poem.title = Some(parse_title(reader)?),
                b"epigraph" => poem.epigraphs.push(parse_epigraph(reader)?),
                b"stanza" => poem.stanzas.push(parse_stanza(reader)?),
                b"text-author" => {
                    poem.authors.push(parse_paragraph(reader, &e, b"text-author")?);
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if local(e.name().as_ref()) == b"poem" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(poem)
}

fn parse_stanza(reader: &mut Reader<&[u8]>) -> Result<Stanza> {
    let mut stanza = Stanza::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"title" => stanza.title = Some(parse_title(reader)?),
                b"v" => stanza.verses.push(parse_paragraph(reader, &e, b"v")?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if local(e.name().as_ref()) == b"stanza" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(stanza)
}

fn parse_cite(reader: &mut Reader<&[u8]>) -> Result<Cite> {
    let mut cite = Cite::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"text-author" => {
                    cite.authors.push(parse_paragraph(reader, &e, b"text-author")?);
                }
                _ => {
                    if let Some(item) = parse_block_item(reader, &e)? {
                        cite.items.push(item);
                    }
                }
            },
            Event::Empty(e) => {
                if let Some(item) = parse_empty_item(&e) {
                    cite.items.push(item);
                }
            }
            Event::End(e) if local(e.name().as_ref()) == b"cite" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cite)
}

fn parse_table(reader: &mut Reader<&[u8]>) -> Result<Table> {
    let mut table = Table::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local(e.name().as_ref()) {
                b"tr" => {
                    let mut row = TableRow::default();
                    loop {
                        match reader.read_event()? {
                            Event::Start(cell) => {
                                let cell_name = cell.name();
                                let name = local(cell_name.as_ref());
                                if name == b"td" || name == b"th" {
                                    let header = name == b"th";
                                    let end: &[u8] = if header { b"th" } else { b"td" };
                                    let runs = parse_runs(reader, end)?;
                                    row.cells.push(TableCell { header, runs });
                                } else {
                                    reader.read_to_end(cell.name())?;
                                }
                            }
                            Event::End(end) if local(end.name().as_ref()) == b"tr" => break,
                            Event::Eof => break,
                            _ => {}
                        }
                    }
                    table.rows.push(row);
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if local(e.name().as_ref()) == b"table" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(table)
}

fn parse_paragraph(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    end_tag: &[u8],
) -> Result<Paragraph> {
    Ok(Paragraph {
        id: attr(start, b"id"),
        style: attr(start, b"style"),
        runs: parse_runs(reader, end_tag)?,
    })
}

/// Collect inline runs until the matching end tag.
fn parse_runs(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<Vec<Run>> {
    let mut runs: Vec<Run> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).replace(['\r', '\n'], " ");
                push_text(&mut runs, &text);
            }
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    push_text(&mut runs, &resolved);
                }
            }
            Event::Start(e) => {
                let name = local(e.name().as_ref()).to_vec();
                match name.as_slice() {
                    b"strong" => runs.push(Run::Strong(parse_runs(reader, b"strong")?)),
                    b"emphasis" => runs.push(Run::Emphasis(parse_runs(reader, b"emphasis")?)),
                    b"strikethrough" => {
                        runs.push(Run::Strikethrough(parse_runs(reader, b"strikethrough")?));
                    }
                    b"sub" => runs.push(Run::Sub(parse_runs(reader, b"sub")?)),
                    b"sup" => runs.push(Run::Sup(parse_runs(reader, b"sup")?)),
                    b"code" => runs.push(Run::Code(parse_runs(reader, b"code")?)),
                    b"style" => {
                        let name = attr(&e, b"name").unwrap_or_default();
                        runs.push(Run::Named {
                            name,
                            runs: parse_runs(reader, b"style")?,
                        });
                    }
                    b"a" => {
                        let href = href_attr(&e).unwrap_or_default();
                        runs.push(Run::Link {
                            href,
                            runs: parse_runs(reader, b"a")?,
                        });
                    }
                    b"image" => {
                        runs.push(Run::Image {
                            href: href_attr(&e).unwrap_or_default(),
                            alt: attr(&e, b"alt"),
                        });
                        reader.read_to_end(e.name())?;
                    }
                    _ => {
                        reader.read_to_end(e.name())?;
                    }
                }
            }
            Event::Empty(e) if local(e.name().as_ref()) == b"image" => {
                runs.push(Run::Image {
                    href: href_attr(&e).unwrap_or_default(),
                    alt: attr(&e, b"alt"),
                });
            }
            Event::End(e) if local(e.name().as_ref()) == end_tag => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(runs)
}

/// Append text, merging consecutive text runs.
fn push_text(runs: &mut Vec<Run>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Run::Text(existing)) = runs.last_mut() {
        existing.push_str(text);
    } else {
        runs.push(Run::Text(text.to_string()));
    }
}

fn block_image(e: &BytesStart<'_>) -> BlockImage {
    BlockImage {
        href: href_attr(e).unwrap_or_default(),
        alt: attr(e, b"alt"),
        title: attr(e, b"title"),
    }
}

/// The local part of a possibly-prefixed element name.
fn local(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// An attribute by local name.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    for attribute in e.attributes().flatten() {
        if local(attribute.key.as_ref()) == key {
            return Some(String::from_utf8_lossy(&attribute.value).into_owned());
        }
    }
    None
}

/// The `l:href` / `xlink:href` / `href` attribute.
fn href_attr(e: &BytesStart<'_>) -> Option<String> {
    attr(e, b"href")
}

/// Text content up to the end tag.
fn read_text(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<String> {
    let mut out = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => out.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    out.push_str(&resolved);
                }
            }
            Event::CData(e) => out.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::End(e) if local(e.name().as_ref()) == end_tag => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Resolve predefined and numeric character references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => Some("&".to_string()),
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "quot" => Some("\"".to_string()),
        "apos" => Some("'".to_string()),
        "nbsp" => Some("\u{a0}".to_string()),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code).map(|c| c.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0"
             xmlns:l="http://www.w3.org/1999/xlink">
  <description><title-info><book-title>T</book-title></title-info></description>
  <body>
    <title><p>Book Title</p></title>
    <section id="ch1">
      <title><p>Chapter <strong>One</strong></p><empty-line/></title>
      <epigraph>
        <p>Quoted words</p>
        <text-author>Someone</text-author>
      </epigraph>
      <p>First paragraph with <emphasis>stress</emphasis> and
         a <a l:href="https://example.com">link</a>.</p>
      <empty-line/>
      <p>Second paragraph with M&#x2014;dash &amp; ampersand.</p>
      <poem>
        <stanza><v>Line one</v><v>Line two</v></stanza>
      </poem>
      <image l:href="#pic1.png" alt="A picture"/>
      <section id="ch1-1">
        <p>Nested.</p>
      </section>
    </section>
  </body>
  <body name="notes">
    <section id="n1"><p>A note.</p></section>
  </body>
</FictionBook>"##;

    #[test]
    fn test_parse_structure() {
        let document = parse_document(SAMPLE).unwrap();
        assert_eq!(document.bodies.len(), 2);
        assert!(document.bodies[1].is_notes());

        let body = &document.bodies[0];
        assert_eq!(body.title.as_ref().unwrap().paragraph_count(), 1);
        assert_eq!(body.sections.len(), 1);

        let section = &body.sections[0];
        assert_eq!(section.id.as_deref(), Some("ch1"));
        assert_eq!(section.title.as_ref().unwrap().lines.len(), 2);
        assert_eq!(section.epigraphs.len(), 1);
        assert_eq!(section.epigraphs[0].authors.len(), 1);
        assert_eq!(section.sections.len(), 1);

        // p, empty-line, p, poem, image
        assert_eq!(section.items.len(), 5);
        assert!(matches!(section.items[1], BlockItem::EmptyLine));
        assert!(matches!(section.items[3], BlockItem::Poem(_)));
        match &section.items[4] {
            BlockItem::Image(image) => {
                assert_eq!(image.href, "#pic1.png");
                assert_eq!(image.alt.as_deref(), Some("A picture"));
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_runs() {
        let document = parse_document(SAMPLE).unwrap();
        let section = &document.bodies[0].sections[0];
        let BlockItem::Paragraph(paragraph) = &section.items[0] else {
            panic!("expected paragraph");
        };
        let text = paragraph.plain_text();
        assert!(text.contains("First paragraph with stress"));

        let has_link = paragraph.runs.iter().any(|run| {
            matches!(run, Run::Link { href, .. } if href == "https://example.com")
        });
        assert!(has_link);
    }

    #[test]
    fn test_entity_resolution() {
        let document = parse_document(SAMPLE).unwrap();
        let section = &document.bodies[0].sections[0];
        let BlockItem::Paragraph(paragraph) = &section.items[2] else {
            panic!("expected paragraph");
        };
        let text = paragraph.plain_text();
        assert!(text.contains('\u{2014}'), "numeric reference resolves");
        assert!(text.contains('&'), "named reference resolves");
    }

    #[test]
    fn test_title_inside_poem() {
        let xml = r#"<body><section><poem>
            <title><p>Poem name</p></title>
            <stanza><v>v1</v></stanza>
            <text-author>Poet</text-author>
        </poem></section></body>"#;
        let document = parse_document(xml).unwrap();
        let BlockItem::Poem(poem) = &document.bodies[0].sections[0].items[0] else {
            panic!("expected poem");
        };
        assert!(poem.title.is_some());
        assert_eq!(poem.stanzas[0].verses.len(), 1);
        assert_eq!(poem.authors.len(), 1);
    }
}
