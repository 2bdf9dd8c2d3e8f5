use super::Rect;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Cubic Bézier from the right-middle of one box to the left-middle of another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectorPath {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

impl ConnectorPath {
    /// SVG path data, `M x1 y1 C cx1 y1, cx2 y2, x2 y2`.
    pub fn to_svg_path(&self) -> String {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            self.start.x,
            self.start.y,
            self.control1.x,
            self.control1.y,
            self.control2.x,
            self.control2.y,
            self.end.x,
            self.end.y
        )
    }

    /// Point on the curve for `t` in `[0, 1]`.
    pub fn point_at(&self, t: f32) -> Point {
        let u = 1.0 - t;
        let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        Point {
            x: a * self.start.x + b * self.control1.x + c * self.control2.x + d * self.end.x,
            y: a * self.start.y + b * self.control1.y + c * self.control2.y + d * self.end.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedConnector {
    pub from_id: String,
    pub to_id: String,
    pub path: ConnectorPath,
}

pub fn connector_path(from: &Rect, to: &Rect, curvature: f32) -> ConnectorPath {
    let start = Point {
        x: from.right(),
        y: from.center_y(),
    };
    let end = Point {
        x: to.x,
        y: to.center_y(),
    };
    let dx = end.x - start.x;
    ConnectorPath {
        start,
        control1: Point {
            x: start.x + curvature * dx,
            y: start.y,
        },
        control2: Point {
            x: end.x - curvature * dx,
            y: end.y,
        },
        end,
    }
}
