//! Export boundary.
//!
//! A view draws itself onto any [`GraphicsContext`]; an exporter (raster,
//! SVG, PDF, a GUI painter) only implements the handful of primitives below
//! and never looks at view internals. [`DisplayList`] records the calls and
//! is what tests and simple exporters use.

use crate::connector::CubicSegment;
use crate::model::{AnchorShape, GroupStyle, Point, Rect};

use super::element::{VElement, VKind, VState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);
pub const SELECTED: Rgb = Rgb(30, 110, 230);
pub const HIGHLIGHT: Rgb = Rgb(250, 170, 0);
const GROUP_OUTLINE: Rgb = Rgb(128, 128, 128);
const COMPLEX_FILL: Rgb = Rgb(235, 235, 235);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub stroke: Rgb,
    pub fill: Option<Rgb>,
    pub width: f64,
    pub dashed: bool,
}

impl Paint {
    pub const fn outline(stroke: Rgb) -> Self {
        Self {
            stroke,
            fill: None,
            width: 1.0,
            dashed: false,
        }
    }

    pub const fn filled(stroke: Rgb, fill: Rgb) -> Self {
        Self {
            stroke,
            fill: Some(fill),
            width: 1.0,
            dashed: false,
        }
    }
}

/// Drawing primitives, all in view coordinates.
pub trait GraphicsContext {
    fn rect(&mut self, bounds: Rect, paint: &Paint);
    fn ellipse(&mut self, bounds: Rect, paint: &Paint);
    fn polyline(&mut self, points: &[Point], paint: &Paint);
    fn bezier(&mut self, spans: &[CubicSegment], paint: &Paint);
    /// Arrowhead with its tip at `tip`, pointing along the unit vector `direction`.
    fn arrowhead(&mut self, tip: Point, direction: (f64, f64), style: &str, paint: &Paint);
    fn text(&mut self, center: Point, text: &str, paint: &Paint);
}

impl VElement {
    /// Draw this element.
    pub fn render(&self, ctx: &mut dyn GraphicsContext) {
        let stroke = if self.highlighted {
            HIGHLIGHT
        } else if self.state() != VState::Unselected {
            SELECTED
        } else {
            BLACK
        };
        let bounds = self.bounds();

        match self.kind() {
            VKind::DataNode => {
                ctx.rect(bounds, &Paint::filled(stroke, WHITE));
            }
            VKind::State => {
                ctx.ellipse(bounds, &Paint::filled(stroke, WHITE));
            }
            VKind::Label => {
                if self.is_selected() || self.highlighted {
                    ctx.rect(bounds, &Paint { dashed: true, ..Paint::outline(stroke) });
                }
            }
            VKind::Shape { shape_type, .. } => {
                let paint = Paint::outline(stroke);
                match shape_type.as_str() {
                    "Oval" | "Ellipse" | "Circle" => ctx.ellipse(bounds, &paint),
                    _ => ctx.rect(bounds, &paint),
                }
            }
            VKind::Group { style } => {
                let base = if stroke == BLACK { GROUP_OUTLINE } else { stroke };
                let paint = match style {
                    GroupStyle::Complex => Paint::filled(base, COMPLEX_FILL),
                    GroupStyle::None if !self.is_selected() => return,
                    _ => Paint {
                        dashed: true,
                        ..Paint::outline(base)
                    },
                };
                ctx.rect(bounds, &paint);
            }
            VKind::Anchor { shape } => match shape {
                AnchorShape::Square => ctx.rect(bounds, &Paint::filled(stroke, stroke)),
                AnchorShape::Circle => ctx.ellipse(bounds, &Paint::filled(stroke, stroke)),
                AnchorShape::None if self.is_selected() => ctx.rect(bounds, &Paint::outline(stroke)),
                AnchorShape::None => {}
            },
            VKind::Line {
                shape,
                start_arrow,
                end_arrow,
            } => {
                let paint = Paint::outline(stroke);
                if shape.curve.is_empty() {
                    ctx.polyline(&shape.polyline, &paint);
                } else {
                    ctx.bezier(&shape.curve, &paint);
                }
                if let (Some(style), Some(tip), Some(dir)) =
                    (end_arrow.as_deref(), shape.end(), shape.end_direction())
                {
                    ctx.arrowhead(tip, dir, style, &paint);
                }
                if let (Some(style), Some(tip), Some((dx, dy))) =
                    (start_arrow.as_deref(), shape.start(), shape.start_direction())
                {
                    ctx.arrowhead(tip, (-dx, -dy), style, &paint);
                }
            }
            VKind::Handle => {
                ctx.rect(bounds, &Paint::filled(SELECTED, WHITE));
            }
        }

        if let Some(text) = self.text() {
            if !matches!(self.kind(), VKind::Line { .. } | VKind::Group { .. }) {
                ctx.text(bounds.center(), text, &Paint::outline(BLACK));
            }
        }
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect { bounds: Rect, paint: Paint },
    Ellipse { bounds: Rect, paint: Paint },
    Polyline { points: Vec<Point>, paint: Paint },
    Bezier { spans: Vec<CubicSegment>, paint: Paint },
    Arrowhead { tip: Point, direction: (f64, f64), style: String, paint: Paint },
    Text { center: Point, text: String },
}

/// A [`GraphicsContext`] that records every call in order.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounding box of everything drawn.
    pub fn extent(&self) -> Option<Rect> {
        let points = self.commands.iter().flat_map(|c| match c {
            DrawCommand::Rect { bounds, .. } | DrawCommand::Ellipse { bounds, .. } => {
                vec![
                    Point::new(bounds.left, bounds.top),
                    Point::new(bounds.right(), bounds.bottom()),
                ]
            }
            DrawCommand::Polyline { points, .. } => points.clone(),
            DrawCommand::Bezier { spans, .. } => spans.iter().flat_map(|s| [s.from, s.to]).collect(),
            DrawCommand::Arrowhead { tip, .. } => vec![*tip],
            DrawCommand::Text { center, .. } => vec![*center],
        });
        Rect::enclosing(points)
    }
}

impl GraphicsContext for DisplayList {
    fn rect(&mut self, bounds: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::Rect { bounds, paint: *paint });
    }

    fn ellipse(&mut self, bounds: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::Ellipse { bounds, paint: *paint });
    }

    fn polyline(&mut self, points: &[Point], paint: &Paint) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            paint: *paint,
        });
    }

    fn bezier(&mut self, spans: &[CubicSegment], paint: &Paint) {
        self.commands.push(DrawCommand::Bezier {
            spans: spans.to_vec(),
            paint: *paint,
        });
    }

    fn arrowhead(&mut self, tip: Point, direction: (f64, f64), style: &str, paint: &Paint) {
        self.commands.push(DrawCommand::Arrowhead {
            tip,
            direction,
            style: style.to_string(),
            paint: *paint,
        });
    }

    fn text(&mut self, center: Point, text: &str, _paint: &Paint) {
        self.commands.push(DrawCommand::Text {
            center,
            text: text.to_string(),
        });
    }
}
