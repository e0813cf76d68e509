//! Connector routing.
//!
//! Turns a line's two resolved endpoints (plus its waypoints, for segmented
//! lines) into the path that is drawn and hit-tested. Routing is a pure
//! function of its inputs; the pathway decides *when* to reroute (whenever an
//! endpoint's target changes geometry) and caches the result on the line.

use serde::{Deserialize, Serialize};

use crate::model::{Point, Rect};

/// How a line's points are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectorType {
    #[default]
    Straight,
    Elbow,
    Segmented,
    Curved,
}

impl ConnectorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectorType::Straight => "Straight",
            ConnectorType::Elbow => "Elbow",
            ConnectorType::Segmented => "Segmented",
            ConnectorType::Curved => "Curved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Elbow" => ConnectorType::Elbow,
            "Segmented" => ConnectorType::Segmented,
            "Curved" => ConnectorType::Curved,
            _ => ConnectorType::Straight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// An endpoint after resolution against its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedEnd {
    pub point: Point,
    /// Axis along which the line should leave the target, when attached to
    /// a side of a shaped element.
    pub axis: Option<Axis>,
}

impl ResolvedEnd {
    pub fn free(point: Point) -> Self {
        Self { point, axis: None }
    }

    /// Endpoint attached at relative coordinates on `bounds`.
    pub fn on_bounds(bounds: &Rect, rel_x: f64, rel_y: f64) -> Self {
        let axis = if rel_x == 0.0 && rel_y == 0.0 {
            None
        } else if rel_x.abs() >= rel_y.abs() {
            Some(Axis::Horizontal)
        } else {
            Some(Axis::Vertical)
        };
        Self {
            point: bounds.relative_point(rel_x, rel_y),
            axis,
        }
    }
}

/// One cubic Bézier span of a curved connector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CubicSegment {
    pub from: Point,
    pub ctrl1: Point,
    pub ctrl2: Point,
    pub to: Point,
}

impl CubicSegment {
    pub fn eval(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        Point::new(
            a * self.from.x + b * self.ctrl1.x + c * self.ctrl2.x + d * self.to.x,
            a * self.from.y + b * self.ctrl1.y + c * self.ctrl2.y + d * self.to.y,
        )
    }
}

/// Samples per Bézier span when flattening curves.
const CURVE_SAMPLES: usize = 8;

/// Routed path of a line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectorShape {
    pub connector_type: ConnectorType,
    /// Points the path passes through, start and end included.
    pub vertices: Vec<Point>,
    /// Bézier spans for curved connectors, empty otherwise.
    #[serde(default)]
    pub curve: Vec<CubicSegment>,
    /// Flattened path used for hit testing and measuring.
    pub polyline: Vec<Point>,
}

impl ConnectorShape {
    pub fn start(&self) -> Option<Point> {
        self.polyline.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.polyline.last().copied()
    }

    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.polyline.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::enclosing(self.polyline.iter().copied())
    }

    /// Point at `fraction` of the path's length, clamped to [0, 1].
    pub fn point_at_fraction(&self, fraction: f64) -> Option<Point> {
        let first = self.start()?;
        let total = self.length();
        if total <= f64::EPSILON {
            return Some(first);
        }
        let mut remaining = fraction.clamp(0.0, 1.0) * total;
        for (a, b) in self.segments() {
            let len = a.distance(b);
            if remaining <= len {
                let t = if len <= f64::EPSILON { 0.0 } else { remaining / len };
                return Some(Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t));
            }
            remaining -= len;
        }
        self.end()
    }

    /// Unit direction of the first non-degenerate segment, pointing into the path.
    pub fn start_direction(&self) -> Option<(f64, f64)> {
        self.segments()
            .find(|(a, b)| a.distance(*b) > f64::EPSILON)
            .map(|(a, b)| unit(a, b))
    }

    /// Unit direction of the last non-degenerate segment, pointing out of the path.
    /// Used for placing arrowheads.
    pub fn end_direction(&self) -> Option<(f64, f64)> {
        let segs: Vec<_> = self.segments().collect();
        segs.into_iter()
            .rev()
            .find(|(a, b)| a.distance(*b) > f64::EPSILON)
            .map(|(a, b)| unit(a, b))
    }

    /// True if `p` lies within `tolerance` of the path.
    pub fn hit_test(&self, p: Point, tolerance: f64) -> bool {
        if self.polyline.len() == 1 {
            return self.polyline[0].distance(p) <= tolerance;
        }
        self.segments()
            .any(|(a, b)| distance_to_segment(p, a, b) <= tolerance)
    }

    /// Same path in a coordinate space scaled by `factor` (model to view).
    pub fn scale(&self, factor: f64) -> ConnectorShape {
        self.map(|p| p.scale(factor))
    }

    pub fn translate(&self, dx: f64, dy: f64) -> ConnectorShape {
        self.map(|p| p.offset(dx, dy))
    }

    fn map(&self, f: impl Fn(Point) -> Point) -> ConnectorShape {
        let shift = |p: &Point| f(*p);
        ConnectorShape {
            connector_type: self.connector_type,
            vertices: self.vertices.iter().map(shift).collect(),
            curve: self
                .curve
                .iter()
                .map(|c| CubicSegment {
                    from: shift(&c.from),
                    ctrl1: shift(&c.ctrl1),
                    ctrl2: shift(&c.ctrl2),
                    to: shift(&c.to),
                })
                .collect(),
            polyline: self.polyline.iter().map(shift).collect(),
        }
    }
}

fn unit(a: Point, b: Point) -> (f64, f64) {
    let len = a.distance(b);
    ((b.x - a.x) / len, (b.y - a.y) / len)
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let len_sq = (b.x - a.x).powi(2) + (b.y - a.y).powi(2);
    if len_sq <= f64::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)))
}

/// Route a connector between two resolved ends.
///
/// `waypoints` are only used by [`ConnectorType::Segmented`].
pub fn route(
    connector_type: ConnectorType,
    start: ResolvedEnd,
    end: ResolvedEnd,
    waypoints: &[Point],
) -> ConnectorShape {
    let vertices = match connector_type {
        ConnectorType::Straight => vec![start.point, end.point],
        ConnectorType::Segmented => {
            let mut v = Vec::with_capacity(waypoints.len() + 2);
            v.push(start.point);
            v.extend_from_slice(waypoints);
            v.push(end.point);
            v
        }
        ConnectorType::Elbow | ConnectorType::Curved => elbow_route(start, end),
    };
    let vertices = dedup(vertices);

    let (curve, polyline) = if connector_type == ConnectorType::Curved && vertices.len() > 2 {
        let curve = catmull_rom(&vertices);
        let polyline = flatten(&curve);
        (curve, polyline)
    } else {
        (Vec::new(), vertices.clone())
    };

    ConnectorShape {
        connector_type,
        vertices,
        curve,
        polyline,
    }
}

/// Orthogonal route between two ends.
///
/// Attached ends leave their target along the side they are attached to;
/// free ends follow the larger displacement, horizontal first when
/// `|dx| >= |dy|`.
pub fn elbow_route(start: ResolvedEnd, end: ResolvedEnd) -> Vec<Point> {
    let (s, e) = (start.point, end.point);
    let dx = e.x - s.x;
    let dy = e.y - s.y;
    if dx.abs() <= f64::EPSILON || dy.abs() <= f64::EPSILON {
        return vec![s, e];
    }

    let preferred = if dx.abs() >= dy.abs() {
        Axis::Horizontal
    } else {
        Axis::Vertical
    };
    let start_axis = start.axis.unwrap_or(preferred);
    let end_axis = end.axis.unwrap_or(start_axis);

    match (start_axis, end_axis) {
        (Axis::Horizontal, Axis::Horizontal) => {
            let mid_x = (s.x + e.x) / 2.0;
            vec![s, Point::new(mid_x, s.y), Point::new(mid_x, e.y), e]
        }
        (Axis::Vertical, Axis::Vertical) => {
            let mid_y = (s.y + e.y) / 2.0;
            vec![s, Point::new(s.x, mid_y), Point::new(e.x, mid_y), e]
        }
        (Axis::Horizontal, Axis::Vertical) => vec![s, Point::new(e.x, s.y), e],
        (Axis::Vertical, Axis::Horizontal) => vec![s, Point::new(s.x, e.y), e],
    }
}

fn dedup(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_some_and(|last| last.approx_eq(p, 1e-9)) {
            continue;
        }
        out.push(p);
    }
    if out.len() == 1 {
        // degenerate line: keep both ends so the path still has a segment
        out.push(out[0]);
    }
    out
}

/// Bézier spans through every vertex with Catmull-Rom tangents.
fn catmull_rom(vertices: &[Point]) -> Vec<CubicSegment> {
    let n = vertices.len();
    (0..n - 1)
        .map(|i| {
            let p0 = vertices[i.saturating_sub(1)];
            let p1 = vertices[i];
            let p2 = vertices[i + 1];
            let p3 = vertices[(i + 2).min(n - 1)];
            CubicSegment {
                from: p1,
                ctrl1: Point::new(p1.x + (p2.x - p0.x) / 6.0, p1.y + (p2.y - p0.y) / 6.0),
                ctrl2: Point::new(p2.x - (p3.x - p1.x) / 6.0, p2.y - (p3.y - p1.y) / 6.0),
                to: p2,
            }
        })
        .collect()
}

fn flatten(curve: &[CubicSegment]) -> Vec<Point> {
    let mut out = Vec::with_capacity(curve.len() * CURVE_SAMPLES + 1);
    if let Some(first) = curve.first() {
        out.push(first.from);
    }
    for seg in curve {
        for i in 1..=CURVE_SAMPLES {
            out.push(seg.eval(i as f64 / CURVE_SAMPLES as f64));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free(x: f64, y: f64) -> ResolvedEnd {
        ResolvedEnd::free(Point::new(x, y))
    }

    #[test]
    fn test_straight_route() {
        let shape = route(ConnectorType::Straight, free(0.0, 0.0), free(30.0, 40.0), &[]);
        assert_eq!(shape.polyline, vec![Point::new(0.0, 0.0), Point::new(30.0, 40.0)]);
        assert_eq!(shape.length(), 50.0);
    }

    #[test]
    fn test_elbow_horizontal_first_on_tie() {
        let pts = elbow_route(free(0.0, 0.0), free(100.0, 100.0));
        assert_eq!(
            pts,
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 100.0),
                Point::new(100.0, 100.0)
            ]
        );
    }

    #[test]
    fn test_elbow_vertical_when_dy_dominates() {
        let pts = elbow_route(free(0.0, 0.0), free(20.0, 100.0));
        assert_eq!(pts[1], Point::new(0.0, 50.0));
        assert_eq!(pts[2], Point::new(20.0, 50.0));
    }

    #[test]
    fn test_elbow_segments_are_orthogonal() {
        let shape = route(ConnectorType::Elbow, free(3.0, 7.0), free(-40.0, 90.0), &[]);
        for (a, b) in shape.segments() {
            assert!(a.x == b.x || a.y == b.y, "diagonal segment {a:?} -> {b:?}");
        }
    }

    #[test]
    fn test_elbow_aligned_is_single_segment() {
        let pts = elbow_route(free(0.0, 10.0), free(80.0, 10.0));
        assert_eq!(pts.len(), 2);
    }

    #[test]
    fn test_elbow_mixed_axes_is_l_shape() {
        let bounds = Rect::new(0.0, 0.0, 20.0, 20.0);
        let start = ResolvedEnd::on_bounds(&bounds, 1.0, 0.0);
        let end = ResolvedEnd {
            point: Point::new(100.0, 100.0),
            axis: Some(Axis::Vertical),
        };
        let pts = elbow_route(start, end);
        assert_eq!(pts, vec![Point::new(20.0, 10.0), Point::new(100.0, 10.0), Point::new(100.0, 100.0)]);
    }

    #[test]
    fn test_segmented_uses_waypoints_verbatim() {
        let wp = [Point::new(10.0, 50.0), Point::new(60.0, 50.0)];
        let shape = route(ConnectorType::Segmented, free(0.0, 0.0), free(70.0, 0.0), &wp);
        assert_eq!(shape.vertices.len(), 4);
        assert_eq!(shape.vertices[1], wp[0]);
        assert_eq!(shape.vertices[2], wp[1]);
    }

    #[test]
    fn test_curved_passes_through_vertices() {
        let shape = route(ConnectorType::Curved, free(0.0, 0.0), free(100.0, 60.0), &[]);
        assert!(!shape.curve.is_empty());
        assert_eq!(shape.start(), Some(Point::new(0.0, 0.0)));
        assert!(shape.end().unwrap().approx_eq(Point::new(100.0, 60.0), 1e-9));
        for v in &shape.vertices {
            assert!(shape.hit_test(*v, 1e-6));
        }
    }

    #[test]
    fn test_point_at_fraction_and_directions() {
        let shape = route(ConnectorType::Straight, free(0.0, 0.0), free(100.0, 0.0), &[]);
        assert_eq!(shape.point_at_fraction(0.25), Some(Point::new(25.0, 0.0)));
        assert_eq!(shape.end_direction(), Some((1.0, 0.0)));
        assert!(shape.hit_test(Point::new(50.0, 2.0), 3.0));
        assert!(!shape.hit_test(Point::new(50.0, 5.0), 3.0));
    }
}
