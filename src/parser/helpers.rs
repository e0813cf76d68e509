//! Helper functions for reading attribute values of pathway XML nodes.

use anyhow::{Context, Result, anyhow};
use roxmltree::Node;

use crate::model::{ElementId, Rect, Xref};

/// First child element with the given tag name.
pub fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.is_element() && c.has_tag_name(tag))
}

/// All child elements with the given tag name.
pub fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |c| c.is_element() && c.has_tag_name(tag))
}

pub fn attr_string(node: Node, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

pub fn attr_id(node: Node, name: &str) -> Option<ElementId> {
    node.attribute(name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ElementId::from)
}

/// Parse a numeric attribute. Absent is `None`, malformed is an error.
pub fn attr_f64(node: Node, name: &str) -> Result<Option<f64>> {
    node.attribute(name)
        .map(|v| {
            v.trim().parse::<f64>().with_context(|| {
                format!("Invalid {}=\"{}\" on <{}>", name, v, node.tag_name().name())
            })
        })
        .transpose()
}

pub fn attr_i32(node: Node, name: &str) -> Result<Option<i32>> {
    node.attribute(name)
        .map(|v| {
            v.trim().parse::<i32>().with_context(|| {
                format!("Invalid {}=\"{}\" on <{}>", name, v, node.tag_name().name())
            })
        })
        .transpose()
}

/// Bounds stored as `CenterX`/`CenterY`/`Width`/`Height` on a `<Graphics>`
/// child. Missing values fall back to `default`.
pub fn parse_rect(node: Node, default: Rect) -> Result<Rect> {
    let Some(graphics) = child(node, "Graphics") else {
        return Ok(default);
    };
    let width = attr_f64(graphics, "Width")?.unwrap_or(default.width);
    let height = attr_f64(graphics, "Height")?.unwrap_or(default.height);
    let cx = attr_f64(graphics, "CenterX")?.unwrap_or(default.center_x());
    let cy = attr_f64(graphics, "CenterY")?.unwrap_or(default.center_y());
    if width < 0.0 || height < 0.0 {
        return Err(anyhow!(
            "Negative size {}x{} on <{}>",
            width,
            height,
            node.tag_name().name()
        ));
    }
    Ok(Rect::from_center(cx, cy, width, height))
}

/// `<Xref Database=".." ID=".."/>` child, if it names anything.
pub fn parse_xref(node: Node) -> Option<Xref> {
    let x = child(node, "Xref")?;
    let identifier = x.attribute("ID").unwrap_or_default().to_string();
    let data_source = x.attribute("Database").unwrap_or_default().to_string();
    if identifier.is_empty() && data_source.is_empty() {
        return None;
    }
    Some(Xref {
        identifier,
        data_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_parse_rect_from_center() {
        let doc = Document::parse(r#"<DataNode><Graphics CenterX="50" CenterY="20" Width="80" Height="20"/></DataNode>"#)
            .unwrap();
        let rect = parse_rect(doc.root_element(), Rect::default()).unwrap();
        assert_eq!(rect, Rect::new(10.0, 10.0, 80.0, 20.0));
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let doc = Document::parse(r#"<Graphics Width="wide"/>"#).unwrap();
        let err = attr_f64(doc.root_element(), "Width").unwrap_err();
        assert!(err.to_string().contains("Width"));
    }

    #[test]
    fn test_empty_xref_is_none() {
        let doc = Document::parse(r#"<DataNode><Xref Database="" ID=""/></DataNode>"#).unwrap();
        assert!(parse_xref(doc.root_element()).is_none());
    }
}
