//! Pathway XML writer – the inverse of [`crate::parser::read_from_xml`].
//!
//! Elements are written in pathway order. Pathway info becomes attributes of
//! the `<Pathway>` root, anchors are nested inside the `<Graphics>` of their
//! host line. Values the pathway derives (group bounds, member lists, routed
//! connector shapes, anchor points) are left out.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use camino::Utf8Path;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use crate::model::{ElementKind, LineElement, PathwayElement, Rect, Xref};
use crate::pathway::PathwayModel;

/// Serialize a pathway to an XML string.
pub fn write_to_xml(model: &PathwayModel) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    write_to_writer(model, &mut buf)?;
    String::from_utf8(buf.into_inner()).context("Generated pathway XML is not UTF-8")
}

/// Serialize a pathway into any byte sink.
pub fn write_to_writer<W: Write>(model: &PathwayModel, sink: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(sink, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = Tag::new("Pathway");
    if let Some(info) = model.info() {
        root = root
            .attr("Name", &info.title)
            .opt("Organism", info.organism.as_deref())
            .opt("Source", info.source.as_deref())
            .opt("Version", info.version.as_deref())
            .opt("Author", info.author.as_deref());
    }
    writer.write_event(Event::Start(root.start))?;

    let mut written = 0usize;
    for element in model.elements() {
        if write_element(&mut writer, model, element)? {
            written += 1;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("Pathway")))?;
    writer.get_mut().flush()?;
    debug!(elements = written, "wrote pathway document");
    Ok(())
}

/// Write a pathway document to the filesystem.
pub fn write_to_file(model: &PathwayModel, path: &Utf8Path) -> Result<()> {
    let text = write_to_xml(model)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write pathway {}", path))
}

// ────────────────────────────────────────────────────────────────────────────
// Element writers
// ────────────────────────────────────────────────────────────────────────────

/// Small builder over [`BytesStart`] that skips absent attributes.
struct Tag {
    start: BytesStart<'static>,
}

impl Tag {
    fn new(name: &'static str) -> Self {
        Self {
            start: BytesStart::new(name),
        }
    }

    fn attr(mut self, key: &str, value: &str) -> Self {
        self.start.push_attribute((key, value));
        self
    }

    fn opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    fn num(self, key: &str, value: f64) -> Self {
        self.attr(key, &value.to_string())
    }
}

type XmlWriter<W> = Writer<W>;

/// Returns `false` for elements written elsewhere (info, anchors).
fn write_element<W: Write>(
    writer: &mut XmlWriter<W>,
    model: &PathwayModel,
    element: &PathwayElement,
) -> Result<bool> {
    let object_type = element.object_type();
    let mut tag = Tag::new(object_type.tag_name());
    match &element.kind {
        ElementKind::Pathway(_) | ElementKind::Anchor(_) => return Ok(false),
        ElementKind::DataNode(node) => {
            tag = tag
                .attr("TextLabel", &node.text_label)
                .attr("Type", node.node_type.as_str())
                .opt("AliasRef", node.alias_ref.as_ref().map(|a| a.as_str()));
        }
        ElementKind::State(state) => {
            tag = tag
                .opt("GraphRef", state.parent.as_ref().map(|p| p.as_str()))
                .attr("TextLabel", &state.text_label);
        }
        ElementKind::Label(label) => {
            tag = tag
                .attr("TextLabel", &label.text_label)
                .opt("Href", label.href.as_deref());
        }
        ElementKind::Shape(shape) => {
            tag = tag.attr("TextLabel", &shape.text_label);
        }
        ElementKind::Group(group) => {
            tag = tag
                .attr("Style", group.style.as_str())
                .opt("TextLabel", group.text_label.as_deref());
        }
        ElementKind::Citation(c) => {
            tag = tag
                .opt("Title", c.title.as_deref())
                .opt("Source", c.source.as_deref())
                .opt("Year", c.year.map(|y| y.to_string()).as_deref())
                .opt("Url", c.url.as_deref());
        }
        ElementKind::Annotation(a) => {
            tag = tag
                .attr("Value", &a.value)
                .opt("Type", a.annotation_type.as_deref())
                .opt("Url", a.url.as_deref());
        }
        ElementKind::Evidence(e) => {
            tag = tag.opt("Value", e.value.as_deref()).opt("Url", e.url.as_deref());
        }
        ElementKind::Interaction(_) | ElementKind::GraphicalLine(_) => {}
    }
    tag = common_attrs(tag, element);

    let start = tag.start;
    let name = object_type.tag_name();
    writer.write_event(Event::Start(start))?;

    for comment in &element.comments {
        writer.write_event(Event::Start(BytesStart::new("Comment")))?;
        writer.write_event(Event::Text(BytesText::new(comment)))?;
        writer.write_event(Event::End(BytesEnd::new("Comment")))?;
    }

    match &element.kind {
        ElementKind::DataNode(node) => {
            write_rect(writer, Tag::new("Graphics"), &node.bounds)?;
            write_xref(writer, node.xref.as_ref())?;
        }
        ElementKind::State(state) => {
            let graphics = Tag::new("Graphics")
                .num("RelX", state.rel_x)
                .num("RelY", state.rel_y)
                .num("Width", state.width)
                .num("Height", state.height);
            writer.write_event(Event::Empty(graphics.start))?;
        }
        ElementKind::Label(label) => write_rect(writer, Tag::new("Graphics"), &label.bounds)?,
        ElementKind::Shape(shape) => {
            let graphics = Tag::new("Graphics")
                .attr("ShapeType", &shape.shape_type)
                .num("Rotation", shape.rotation);
            write_rect(writer, graphics, &shape.bounds)?;
        }
        ElementKind::Interaction(line) | ElementKind::GraphicalLine(line) => {
            write_line(writer, model, line)?;
        }
        ElementKind::Citation(c) => {
            for author in &c.authors {
                writer.write_event(Event::Start(BytesStart::new("Author")))?;
                writer.write_event(Event::Text(BytesText::new(author)))?;
                writer.write_event(Event::End(BytesEnd::new("Author")))?;
            }
            write_xref(writer, c.xref.as_ref())?;
        }
        ElementKind::Annotation(a) => write_xref(writer, a.xref.as_ref())?,
        ElementKind::Evidence(e) => write_xref(writer, e.xref.as_ref())?,
        ElementKind::Group(_) | ElementKind::Pathway(_) | ElementKind::Anchor(_) => {}
    }

    for (tag_name, refs) in [
        ("CitationRef", &element.citation_refs),
        ("AnnotationRef", &element.annotation_refs),
        ("EvidenceRef", &element.evidence_refs),
    ] {
        for r in refs {
            let tag = Tag::new(tag_name).attr("Ref", r.as_str());
            writer.write_event(Event::Empty(tag.start))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(true)
}

fn common_attrs(tag: Tag, element: &PathwayElement) -> Tag {
    tag.opt("GraphId", element.id().map(|id| id.as_str()))
        .opt("GroupRef", element.group_ref.as_ref().map(|g| g.as_str()))
        .attr("ZOrder", &element.z_order.to_string())
}

fn write_rect<W: Write>(writer: &mut XmlWriter<W>, tag: Tag, rect: &Rect) -> Result<()> {
    let tag = tag
        .num("CenterX", rect.center_x())
        .num("CenterY", rect.center_y())
        .num("Width", rect.width)
        .num("Height", rect.height);
    writer.write_event(Event::Empty(tag.start))?;
    Ok(())
}

fn write_xref<W: Write>(writer: &mut XmlWriter<W>, xref: Option<&Xref>) -> Result<()> {
    if let Some(x) = xref {
        let tag = Tag::new("Xref")
            .attr("Database", &x.data_source)
            .attr("ID", &x.identifier);
        writer.write_event(Event::Empty(tag.start))?;
    }
    Ok(())
}

fn write_line<W: Write>(writer: &mut XmlWriter<W>, model: &PathwayModel, line: &LineElement) -> Result<()> {
    let graphics = Tag::new("Graphics").attr("ConnectorType", line.connector_type.as_str());
    writer.write_event(Event::Start(graphics.start))?;
    for point in &line.points {
        let tag = Tag::new("Point")
            .num("X", point.x)
            .num("Y", point.y)
            .opt("GraphRef", point.element_ref.as_ref().map(|r| r.as_str()));
        let tag = if point.element_ref.is_some() {
            tag.num("RelX", point.rel_x).num("RelY", point.rel_y)
        } else {
            tag
        };
        let tag = tag.opt("ArrowHead", point.arrow_head.as_deref());
        writer.write_event(Event::Empty(tag.start))?;
    }
    for anchor_id in &line.anchors {
        let Some(anchor) = model.get_element(anchor_id).and_then(|e| e.as_anchor()) else {
            continue;
        };
        let tag = Tag::new("Anchor")
            .attr("GraphId", anchor_id.as_str())
            .num("Position", anchor.position)
            .attr("Shape", anchor.shape.as_str());
        writer.write_event(Event::Empty(tag.start))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Graphics")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::connector::ConnectorType;
    use crate::model::{
        Citation, DataNodeType, GroupStyle, LinePoint, PathwayInfo,
    };
    use crate::parser::read_from_xml;

    fn sample() -> PathwayModel {
        let mut model = PathwayModel::new();
        model
            .set_info(PathwayInfo {
                title: "Glycolysis & friends".to_string(),
                organism: Some("Homo sapiens".to_string()),
                ..Default::default()
            })
            .unwrap();
        let mut a = PathwayElement::data_node("HK1", DataNodeType::GeneProduct, Rect::new(0.0, 0.0, 80.0, 20.0))
            .with_id("a");
        a.comments.push("rate <limiting>".to_string());
        model.add(a).unwrap();
        model
            .add(PathwayElement::data_node("G6P", DataNodeType::Metabolite, Rect::new(200.0, 0.0, 80.0, 20.0)).with_id("b"))
            .unwrap();
        model
            .add(PathwayElement::interaction(
                LinePoint::linked("a", 1.0, 0.0),
                LinePoint::linked("b", -1.0, 0.0),
                ConnectorType::Elbow,
            ).with_id("l"))
            .unwrap();
        model.add(PathwayElement::anchor("l", 0.5).with_id("an")).unwrap();
        model.add(PathwayElement::group(GroupStyle::Complex).with_id("g")).unwrap();
        model.add_to_group(&"g".into(), &"a".into()).unwrap();
        model
            .add(PathwayElement::citation(Citation {
                title: Some("Hexokinase".to_string()),
                year: Some(1999),
                authors: vec!["Smith J".to_string()],
                ..Default::default()
            }).with_id("c"))
            .unwrap();
        model.add_citation_ref(&"a".into(), &"c".into()).unwrap();
        model
    }

    #[test]
    fn test_document_shape() {
        let xml = write_to_xml(&sample()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<Pathway Name=\"Glycolysis &amp; friends\" Organism=\"Homo sapiens\">"));
        assert!(xml.contains("<Comment>rate &lt;limiting&gt;</Comment>"));
        assert!(xml.contains("<Anchor GraphId=\"an\" Position=\"0.5\" Shape=\"None\"/>"));
        assert!(xml.contains("<CitationRef Ref=\"c\"/>"));
        // derived values stay out
        assert!(!xml.contains("Members"));
        assert_eq!(xml.matches("<Anchor").count(), 1);
    }

    #[test]
    fn test_roundtrip_is_stable() {
        let first = write_to_xml(&sample()).unwrap();
        let model = read_from_xml(&first, &EditorConfig::default()).unwrap();
        assert!(model.validate().is_empty());
        let second = write_to_xml(&model).unwrap();
        assert_eq!(first, second);

        let a = model.get_element(&"a".into()).unwrap();
        assert_eq!(a.group_ref.as_ref(), Some(&"g".into()));
        assert_eq!(a.comments, vec!["rate <limiting>".to_string()]);
        assert_eq!(model.info().unwrap().title, "Glycolysis & friends");
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("p.xml")).unwrap();
        write_to_file(&sample(), &path).unwrap();
        let back = crate::parser::read_from_file(&path, &EditorConfig::default()).unwrap();
        assert_eq!(back.count(crate::model::ObjectType::DataNode), 2);
    }
}
