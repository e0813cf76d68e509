//! Pathway XML reader.
//!
//! Reads the flat pathway document format written by
//! [`crate::generator::write_to_xml`] into a [`PathwayModel`]:
//!
//! ```xml
//! <Pathway Name="Glycolysis" Organism="Homo sapiens">
//!   <DataNode GraphId="a" TextLabel="HK1" Type="GeneProduct">
//!     <Graphics CenterX="100" CenterY="50" Width="80" Height="20"/>
//!   </DataNode>
//!   <Interaction GraphId="l1">
//!     <Graphics ConnectorType="Elbow">
//!       <Point X="140" Y="50" GraphRef="a" RelX="1" RelY="0"/>
//!       <Point X="300" Y="50" ArrowHead="Arrow"/>
//!       <Anchor GraphId="an1" Position="0.5" Shape="Circle"/>
//!     </Graphics>
//!   </Interaction>
//! </Pathway>
//! ```
//!
//! Derived values (group bounds, connector shapes, anchor positions) are not
//! part of the format; the pathway computes them when the elements are
//! added. Sub-modules:
//!
//! - [`source`] – File I/O abstraction (filesystem vs. memory)
//! - [`helpers`] – Attribute, bounds and xref parsing

pub mod helpers;
pub mod source;

pub use source::*;

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use camino::Utf8Path;
use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::config::EditorConfig;
use crate::connector::ConnectorType;
use crate::model::{
    Anchor, AnchorShape, Annotation, Citation, DataNode, DataNodeType, ElementId, ElementKind,
    Evidence, Group, GroupStyle, Label, LineElement, LinePoint, ObjectType, PathwayElement,
    PathwayInfo, Shape, State,
};
use crate::pathway::PathwayModel;

use helpers::{attr_f64, attr_i32, attr_id, attr_string, child, children, parse_rect, parse_xref};

/// Parse a pathway document.
pub fn read_from_xml(text: &str, config: &EditorConfig) -> Result<PathwayModel> {
    let doc = Document::parse(text).context("Failed to parse pathway XML")?;
    let root = doc.root_element();
    if !root.has_tag_name("Pathway") {
        bail!("Expected a <Pathway> root element, found <{}>", root.tag_name().name());
    }

    let mut model = PathwayModel::with_config(config.clone());
    let reserved: HashSet<ElementId> = doc
        .descendants()
        .filter_map(|n| attr_id(n, "GraphId"))
        .collect();
    let mut counter = model.id_counter();

    let mut elements = Vec::new();
    if root.attribute("Name").is_some() {
        elements.push(PathwayElement::info(parse_info(root)));
    }
    for node in root.children().filter(|n| n.is_element()) {
        let tag = node.tag_name().name();
        let Some(object_type) = ObjectType::from_tag_name(tag) else {
            warn!(tag, "skipping unknown pathway element");
            continue;
        };
        if object_type == ObjectType::Pathway {
            warn!("skipping nested <Pathway>");
            continue;
        }
        let mut element = parse_element(node, object_type)
            .with_context(|| format!("Invalid <{}> {}", tag, node.attribute("GraphId").unwrap_or("")))?;
        if object_type.is_line() {
            let anchors: Vec<Node> = child(node, "Graphics")
                .map(|g| children(g, "Anchor").collect())
                .unwrap_or_default();
            if !anchors.is_empty() {
                let line_id = match element.id() {
                    Some(id) => id.clone(),
                    None => {
                        let id = model.unused_id(&mut counter, &reserved);
                        element.id = Some(id.clone());
                        id
                    }
                };
                elements.push(element);
                for a in anchors {
                    let mut anchor = parse_anchor(a)?;
                    if let ElementKind::Anchor(payload) = &mut anchor.kind {
                        payload.line = Some(line_id.clone());
                    }
                    elements.push(anchor);
                }
                continue;
            }
        }
        elements.push(element);
    }

    let n = elements.len();
    model
        .add_all(elements)
        .context("Pathway document is inconsistent")?;
    model.drain_events();
    debug!(elements = n, "read pathway document");
    Ok(model)
}

/// Read a pathway document from the filesystem.
pub fn read_from_file(path: &Utf8Path, config: &EditorConfig) -> Result<PathwayModel> {
    read_from_source(&mut FsSource, path, config)
}

/// Read a pathway document through a [`ContentSource`].
pub fn read_from_source<S: ContentSource>(
    source: &mut S,
    path: &Utf8Path,
    config: &EditorConfig,
) -> Result<PathwayModel> {
    let text = source.read_to_string(path)?;
    read_from_xml(&text, config).with_context(|| format!("Failed to read pathway {}", path))
}

fn parse_info(root: Node) -> PathwayInfo {
    PathwayInfo {
        title: root.attribute("Name").unwrap_or_default().to_string(),
        organism: attr_string(root, "Organism"),
        source: attr_string(root, "Source"),
        version: attr_string(root, "Version"),
        author: attr_string(root, "Author"),
    }
}

/// Parse one top-level element with the attributes every element shares.
fn parse_element(node: Node, object_type: ObjectType) -> Result<PathwayElement> {
    let mut element = PathwayElement::new(parse_kind(node, object_type)?);
    element.id = attr_id(node, "GraphId");
    element.group_ref = attr_id(node, "GroupRef");
    if let Some(z) = attr_i32(node, "ZOrder")? {
        element.z_order = z;
    }
    element.comments = children(node, "Comment")
        .filter_map(|c| c.text())
        .map(str::to_string)
        .collect();
    element.citation_refs = children(node, "CitationRef").filter_map(|c| attr_id(c, "Ref")).collect();
    element.annotation_refs = children(node, "AnnotationRef").filter_map(|c| attr_id(c, "Ref")).collect();
    element.evidence_refs = children(node, "EvidenceRef").filter_map(|c| attr_id(c, "Ref")).collect();
    Ok(element)
}

fn text_label(node: Node) -> String {
    node.attribute("TextLabel").unwrap_or_default().to_string()
}

fn parse_kind(node: Node, object_type: ObjectType) -> Result<ElementKind> {
    let defaults = PathwayElement::create(object_type);
    let default_bounds = defaults.shaped_bounds().unwrap_or_default();
    let kind = match object_type {
        ObjectType::DataNode => ElementKind::DataNode(DataNode {
            text_label: text_label(node),
            node_type: DataNodeType::parse(node.attribute("Type").unwrap_or_default()),
            bounds: parse_rect(node, default_bounds)?,
            xref: parse_xref(node),
            alias_ref: attr_id(node, "AliasRef"),
            states: Vec::new(),
        }),
        ObjectType::State => {
            let graphics = child(node, "Graphics");
            let num = |name: &str, default: f64| -> Result<f64> {
                Ok(match graphics {
                    Some(g) => attr_f64(g, name)?.unwrap_or(default),
                    None => default,
                })
            };
            ElementKind::State(State {
                text_label: text_label(node),
                parent: attr_id(node, "GraphRef"),
                rel_x: num("RelX", 0.0)?,
                rel_y: num("RelY", 0.0)?,
                width: num("Width", 15.0)?,
                height: num("Height", 15.0)?,
            })
        }
        ObjectType::Label => ElementKind::Label(Label {
            text_label: text_label(node),
            bounds: parse_rect(node, default_bounds)?,
            href: attr_string(node, "Href"),
        }),
        ObjectType::Shape => {
            let graphics = child(node, "Graphics");
            ElementKind::Shape(Shape {
                text_label: text_label(node),
                shape_type: graphics
                    .and_then(|g| g.attribute("ShapeType"))
                    .unwrap_or("Rectangle")
                    .to_string(),
                bounds: parse_rect(node, default_bounds)?,
                rotation: match graphics {
                    Some(g) => attr_f64(g, "Rotation")?.unwrap_or(0.0),
                    None => 0.0,
                },
            })
        }
        ObjectType::Group => ElementKind::Group(Group {
            style: GroupStyle::parse(node.attribute("Style").unwrap_or_default()),
            text_label: attr_string(node, "TextLabel"),
            ..Default::default()
        }),
        ObjectType::Interaction => ElementKind::Interaction(parse_line(node)?),
        ObjectType::GraphicalLine => ElementKind::GraphicalLine(parse_line(node)?),
        ObjectType::Anchor => {
            let mut anchor = anchor_payload(node)?;
            anchor.line = attr_id(node, "GraphRef");
            ElementKind::Anchor(anchor)
        }
        ObjectType::Citation => ElementKind::Citation(Citation {
            xref: parse_xref(node),
            url: attr_string(node, "Url"),
            title: attr_string(node, "Title"),
            source: attr_string(node, "Source"),
            year: attr_i32(node, "Year")?,
            authors: children(node, "Author")
                .filter_map(|a| a.text())
                .map(str::to_string)
                .collect(),
        }),
        ObjectType::Annotation => ElementKind::Annotation(Annotation {
            value: node.attribute("Value").unwrap_or_default().to_string(),
            annotation_type: attr_string(node, "Type"),
            xref: parse_xref(node),
            url: attr_string(node, "Url"),
        }),
        ObjectType::Evidence => ElementKind::Evidence(Evidence {
            value: attr_string(node, "Value"),
            xref: parse_xref(node),
            url: attr_string(node, "Url"),
        }),
        ObjectType::Pathway => ElementKind::Pathway(parse_info(node)),
    };
    Ok(kind)
}

fn parse_line(node: Node) -> Result<LineElement> {
    let Some(graphics) = child(node, "Graphics") else {
        bail!("line without <Graphics>");
    };
    let connector_type = ConnectorType::parse(graphics.attribute("ConnectorType").unwrap_or_default());
    let points = children(graphics, "Point")
        .map(|p| {
            Ok(LinePoint {
                x: attr_f64(p, "X")?.unwrap_or(0.0),
                y: attr_f64(p, "Y")?.unwrap_or(0.0),
                element_ref: attr_id(p, "GraphRef"),
                rel_x: attr_f64(p, "RelX")?.unwrap_or(0.0),
                rel_y: attr_f64(p, "RelY")?.unwrap_or(0.0),
                arrow_head: attr_string(p, "ArrowHead"),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if points.len() < 2 {
        bail!("line with {} point(s), at least two are needed", points.len());
    }
    Ok(LineElement {
        points,
        connector_type,
        ..Default::default()
    })
}

fn anchor_payload(node: Node) -> Result<Anchor> {
    Ok(Anchor {
        line: None,
        position: attr_f64(node, "Position")?.unwrap_or(0.5).clamp(0.0, 1.0),
        shape: AnchorShape::parse(node.attribute("Shape").unwrap_or_default()),
        ..Default::default()
    })
}

fn parse_anchor(node: Node) -> Result<PathwayElement> {
    let mut element = PathwayElement::new(ElementKind::Anchor(anchor_payload(node)?));
    element.id = attr_id(node, "GraphId");
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineEnd, Point, Rect};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Pathway Name="Sample" Organism="Homo sapiens">
  <DataNode GraphId="a" TextLabel="HK1" Type="GeneProduct" GroupRef="g">
    <Comment>first node</Comment>
    <Graphics CenterX="40" CenterY="10" Width="80" Height="20"/>
    <Xref Database="Entrez Gene" ID="3098"/>
    <CitationRef Ref="c1"/>
  </DataNode>
  <DataNode GraphId="b" TextLabel="G6P" Type="Metabolite" GroupRef="g">
    <Graphics CenterX="240" CenterY="10" Width="80" Height="20"/>
  </DataNode>
  <State GraphId="s" GraphRef="a" TextLabel="P">
    <Graphics RelX="1" RelY="-1" Width="10" Height="10"/>
  </State>
  <Interaction GraphId="l">
    <Graphics ConnectorType="Straight">
      <Point X="0" Y="0" GraphRef="a" RelX="1" RelY="0"/>
      <Point X="0" Y="0" GraphRef="b" RelX="-1" RelY="0" ArrowHead="Arrow"/>
      <Anchor GraphId="an" Position="0.5" Shape="Circle"/>
    </Graphics>
  </Interaction>
  <Group GraphId="g" Style="Complex"/>
  <Citation GraphId="c1" Title="Hexokinase" Year="1999">
    <Author>Smith J</Author>
  </Citation>
  <Mystery/>
</Pathway>"#;

    #[test]
    fn test_read_sample() {
        let model = read_from_xml(SAMPLE, &EditorConfig::default()).unwrap();
        assert!(model.validate().is_empty());
        assert_eq!(model.info().unwrap().title, "Sample");
        assert_eq!(model.count(ObjectType::DataNode), 2);

        let a = model.get_element(&"a".into()).unwrap();
        assert_eq!(a.comments, vec!["first node".to_string()]);
        assert_eq!(a.citation_refs, vec![ElementId::from("c1")]);
        assert_eq!(a.as_data_node().unwrap().states, vec![ElementId::from("s")]);
        assert_eq!(a.shaped_bounds(), Some(Rect::new(0.0, 0.0, 80.0, 20.0)));

        assert_eq!(
            model.line_end_position(&"l".into(), LineEnd::End),
            Some(Point::new(200.0, 10.0))
        );
        let anchor = model.get_element(&"an".into()).unwrap().as_anchor().unwrap();
        assert_eq!(anchor.line.as_ref(), Some(&ElementId::from("l")));
        assert_eq!(anchor.point, Point::new(140.0, 10.0));

        assert_eq!(model.group_members(&"g".into()).unwrap().len(), 2);
        assert!(!model.has_pending_events());
    }

    #[test]
    fn test_anchor_of_line_without_id() {
        let xml = r#"<Pathway>
  <GraphicalLine>
    <Graphics>
      <Point X="0" Y="0"/>
      <Point X="100" Y="0"/>
      <Anchor GraphId="an" Position="0.25"/>
    </Graphics>
  </GraphicalLine>
</Pathway>"#;
        let model = read_from_xml(xml, &EditorConfig::default()).unwrap();
        let anchor = model.get_element(&"an".into()).unwrap().as_anchor().unwrap();
        assert_eq!(anchor.point, Point::new(25.0, 0.0));
        assert!(model.info().is_none());
    }

    #[test]
    fn test_errors_carry_context() {
        let err = read_from_xml("<Pathway><DataNode GraphId=\"x\"><Graphics Width=\"?\"/></DataNode></Pathway>", &EditorConfig::default())
            .unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("DataNode"), "{chain}");
        assert!(chain.contains("Width"), "{chain}");

        assert!(read_from_xml("<Diagram/>", &EditorConfig::default()).is_err());
        let dup = r#"<Pathway><Label GraphId="x"/><Label GraphId="x"/></Pathway>"#;
        let chain = format!("{:#}", read_from_xml(dup, &EditorConfig::default()).unwrap_err());
        assert!(chain.contains("already used"), "{chain}");
    }

    #[test]
    fn test_read_from_memory_source() {
        let mut source = MemorySource::new();
        source.insert("mem/sample.xml", SAMPLE);
        let model = read_from_source(&mut source, Utf8Path::new("mem/sample.xml"), &EditorConfig::default()).unwrap();
        assert_eq!(model.count(ObjectType::Group), 1);
        assert!(read_from_source(&mut source, Utf8Path::new("mem/missing.xml"), &EditorConfig::default()).is_err());
    }
}
