//! Left-to-right tree layout.
//!
//! [`compute_layout`] turns a [`Document`] into a [`SceneGraph`]: one
//! positioned box per visible node, one connector per visible parent/child
//! edge, and the tight bounding box of all boxes. The computation is pure and
//! keeps no state between calls.

pub mod connector;

use crate::config::{FontDescription, LayoutConfig};
use crate::document::{Document, Node};
use crate::text_metrics::TextMeasure;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub use connector::{ConnectorPath, Point, RoutedConnector, connector_path};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub text: String,
    pub class_tag: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub depth: usize,
    pub is_collapsed: bool,
    pub has_notes: bool,
    pub has_children: bool,
}

impl PositionedNode {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Parent to child edge. Geometry is resolved later from the node boxes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub from_id: String,
    pub to_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    fn of(rect: &Rect) -> Self {
        Self {
            min_x: rect.x,
            min_y: rect.y,
            max_x: rect.right(),
            max_y: rect.bottom(),
        }
    }

    fn include(&mut self, rect: &Rect) {
        self.min_x = self.min_x.min(rect.x);
        self.min_y = self.min_y.min(rect.y);
        self.max_x = self.max_x.max(rect.right());
        self.max_y = self.max_y.max(rect.bottom());
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneGraph {
    pub nodes: Vec<PositionedNode>,
    pub connectors: Vec<Connector>,
    pub bounds: Bounds,
}

impl SceneGraph {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn width(&self) -> f32 {
        self.bounds.width()
    }

    pub fn height(&self) -> f32 {
        self.bounds.height()
    }

    /// Resolves every connector to a Bézier curve between its node boxes.
    /// Connectors whose endpoints are not in the scene are skipped.
    pub fn connector_paths(&self, curvature: f32) -> Vec<RoutedConnector> {
        let rects: HashMap<&str, Rect> = self
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node.rect()))
            .collect();
        self.connectors
            .iter()
            .filter_map(|connector| {
                let from = rects.get(connector.from_id.as_str())?;
                let to = rects.get(connector.to_id.as_str())?;
                Some(RoutedConnector {
                    from_id: connector.from_id.clone(),
                    to_id: connector.to_id.clone(),
                    path: connector_path(from, to, curvature),
                })
            })
            .collect()
    }
}

/// Box size of a label: measured width plus horizontal padding, clamped to
/// `[min_text_width, max_text_width]`; one line of text plus vertical padding.
pub fn measure_text<M: TextMeasure + ?Sized>(
    text: &str,
    font: &FontDescription,
    config: &LayoutConfig,
    measurer: &M,
) -> Size {
    let measured = measurer.text_width(text, font);
    // max before min: an inverted range resolves to `max_text_width`.
    let width = (measured + font.padding_x * 2.0)
        .max(config.min_text_width)
        .min(config.max_text_width);
    let height = font.line_height + font.padding_y * 2.0;
    Size { width, height }
}

pub fn compute_layout<M: TextMeasure + ?Sized>(
    document: &Document,
    config: &LayoutConfig,
    font: &FontDescription,
    measurer: &M,
    collapsed: &HashSet<String>,
) -> SceneGraph {
    LayoutEngine::new(config, font, measurer).layout(document, collapsed)
}

#[derive(Debug)]
pub struct LayoutEngine<'a, M: ?Sized> {
    config: &'a LayoutConfig,
    font: &'a FontDescription,
    measurer: &'a M,
}

impl<'a, M: TextMeasure + ?Sized> LayoutEngine<'a, M> {
    pub fn new(config: &'a LayoutConfig, font: &'a FontDescription, measurer: &'a M) -> Self {
        Self {
            config,
            font,
            measurer,
        }
    }

    pub fn measure(&self, text: &str) -> Size {
        measure_text(text, self.font, self.config, self.measurer)
    }

    /// Lays the tree out with the root's top-left corner at the origin.
    ///
    /// Nodes come out in pre-order. Each connector is emitted when its parent
    /// is placed, in child order.
    pub fn layout(&self, document: &Document, collapsed: &HashSet<String>) -> SceneGraph {
        let root = document.root();
        let mut scene = SceneBuilder::default();
        let mut pending = vec![Placement {
            node: root,
            x: 0.0,
            y: 0.0,
            size: self.measure(&root.text),
            depth: 0,
        }];
        while let Some(placement) = pending.pop() {
            let start = pending.len();
            self.place(placement, collapsed, &mut scene, &mut pending);
            // Children were queued top to bottom; visit them in that order.
            pending[start..].reverse();
        }
        let scene = scene.finish();
        tracing::debug!(
            nodes = scene.nodes.len(),
            connectors = scene.connectors.len(),
            width = scene.width(),
            height = scene.height(),
            "computed layout"
        );
        scene
    }

    fn place<'d>(
        &self,
        placement: Placement<'d>,
        collapsed: &HashSet<String>,
        scene: &mut SceneBuilder,
        pending: &mut Vec<Placement<'d>>,
    ) {
        let Placement {
            node,
            x,
            y,
            size,
            depth,
        } = placement;
        let is_collapsed = collapsed.contains(node.id.as_str());
        scene.push(PositionedNode {
            id: node.id.clone(),
            text: node.text.clone(),
            class_tag: node.class_tag.clone(),
            x,
            y,
            width: size.width,
            height: size.height,
            depth,
            is_collapsed,
            has_notes: node.has_notes(),
            has_children: node.has_children(),
        });

        if is_collapsed || node.children.is_empty() {
            return;
        }

        let spacing = self.config.spacing;
        let sizes: Vec<Size> = node
            .children
            .iter()
            .map(|child| self.measure(&child.text))
            .collect();
        let block_height = sizes.iter().map(|size| size.height).sum::<f32>()
            + spacing.vertical * (sizes.len() - 1) as f32;
        let child_x = x + size.width + spacing.horizontal;
        let mut child_y = y + size.height / 2.0 - block_height / 2.0;

        for (child, child_size) in node.children.iter().zip(sizes) {
            scene.connectors.push(Connector {
                from_id: node.id.clone(),
                to_id: child.id.clone(),
            });
            pending.push(Placement {
                node: child,
                x: child_x,
                y: child_y,
                size: child_size,
                depth: depth + 1,
            });
            child_y += child_size.height + spacing.vertical;
        }
    }
}

struct Placement<'d> {
    node: &'d Node,
    x: f32,
    y: f32,
    size: Size,
    depth: usize,
}

#[derive(Default)]
struct SceneBuilder {
    nodes: Vec<PositionedNode>,
    connectors: Vec<Connector>,
    bounds: Option<Bounds>,
}

impl SceneBuilder {
    fn push(&mut self, node: PositionedNode) {
        let rect = node.rect();
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(&rect),
            None => self.bounds = Some(Bounds::of(&rect)),
        }
        self.nodes.push(node);
    }

    fn finish(self) -> SceneGraph {
        SceneGraph {
            nodes: self.nodes,
            connectors: self.connectors,
            bounds: self.bounds.unwrap_or_default(),
        }
    }
}
