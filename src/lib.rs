//! Core of a hierarchical diagram (mind map) editor: an immutable document
//! tree, a command runtime with bounded undo/redo, and a left-to-right layout
//! engine producing a renderer-agnostic scene graph.

pub mod actions;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod layout;
pub mod runtime;
pub mod scene_dump;
pub mod text_metrics;

pub use actions::{Action, ActionFuture, ActionHandler, ActionOutcome, ActionRegistry};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{EditorConfig, FontDescription, LayoutConfig, RuntimeConfig, Spacing, load_config};
pub use document::{Document, Node, NodeData, NodeProperty, PropertyName};
pub use error::{ActionError, DocumentError, RuntimeError};
pub use layout::{
    Bounds, Connector, ConnectorPath, LayoutEngine, PositionedNode, Rect, SceneGraph, Size,
    compute_layout, connector_path, measure_text,
};
pub use runtime::{CommandRuntime, SubscriptionId, parse_snapshot};
pub use text_metrics::{FallbackMeasurer, FontMeasurer, TextMeasure};
