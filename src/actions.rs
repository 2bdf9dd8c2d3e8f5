//! Named actions and the handler registry consulted by the runtime.
//!
//! An [`Action`] is a `{ "type": ..., "params": {...} }` request. Handlers
//! receive the current document by value and return the replacement document
//! (or `None` to leave the state as is). Handlers may suspend before returning.

use crate::document::{Document, NodeData, NodeProperty, PropertyName};
use crate::error::ActionError;
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const UPDATE_NODE_PROPERTY: &str = "updateNodeProperty";
pub const SET_TEXT: &str = "setText";
pub const SET_NOTES: &str = "setNotes";
pub const SET_CLASS: &str = "setClass";
pub const ADD_CHILD: &str = "addChild";
pub const REMOVE_NODE: &str = "removeNode";

pub type ActionOutcome = Result<Option<Document>, ActionError>;
pub type ActionFuture = BoxFuture<'static, ActionOutcome>;

pub trait ActionHandler: Send + Sync {
    fn handle(&self, state: Document, params: Value) -> ActionFuture;
}

impl<F> ActionHandler for F
where
    F: Fn(Document, Value) -> ActionFuture + Send + Sync,
{
    fn handle(&self, state: Document, params: Value) -> ActionFuture {
        self(state, params)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub params: Value,
}

impl Action {
    pub fn new(action_type: impl Into<String>, params: Value) -> Self {
        Self {
            action_type: action_type.into(),
            params,
        }
    }

    pub fn update_node_property(node_id: &str, property: NodeProperty) -> Self {
        let (name, value) = match property {
            NodeProperty::Text(text) => (PropertyName::Text, Some(text)),
            NodeProperty::Notes(notes) => (PropertyName::Notes, notes),
            NodeProperty::ClassTag(class_tag) => (PropertyName::ClassTag, Some(class_tag)),
        };
        Self::new(
            UPDATE_NODE_PROPERTY,
            json!({ "nodeId": node_id, "property": name, "value": value }),
        )
    }

    pub fn set_text(node_id: &str, text: &str) -> Self {
        Self::new(SET_TEXT, json!({ "nodeId": node_id, "text": text }))
    }

    pub fn set_notes(node_id: &str, notes: Option<&str>) -> Self {
        Self::new(SET_NOTES, json!({ "nodeId": node_id, "notes": notes }))
    }

    pub fn set_class(node_id: &str, class_tag: &str) -> Self {
        Self::new(SET_CLASS, json!({ "nodeId": node_id, "classTag": class_tag }))
    }

    pub fn add_child(parent_id: &str, data: &NodeData) -> Self {
        let mut params = serde_json::to_value(data).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut params {
            map.insert("parentId".to_string(), Value::from(parent_id));
        }
        Self::new(ADD_CHILD, params)
    }

    pub fn remove_node(node_id: &str) -> Self {
        Self::new(REMOVE_NODE, json!({ "nodeId": node_id }))
    }
}

/// Table of action handlers keyed by action type.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("handlers", &names)
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the node editing actions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_sync(UPDATE_NODE_PROPERTY, update_node_property);
        registry.register_sync(SET_TEXT, set_text);
        registry.register_sync(SET_NOTES, set_notes);
        registry.register_sync(SET_CLASS, set_class);
        registry.register_sync(ADD_CHILD, add_child);
        registry.register_sync(REMOVE_NODE, remove_node);
        registry
    }

    /// Registers `handler`, returning the handler it replaced, if any.
    pub fn register<H>(&mut self, action_type: impl Into<String>, handler: H) -> Option<Arc<dyn ActionHandler>>
    where
        H: ActionHandler + 'static,
    {
        self.handlers.insert(action_type.into(), Arc::new(handler))
    }

    /// Registers a handler that completes without suspending.
    pub fn register_sync<F>(&mut self, action_type: impl Into<String>, handler: F) -> Option<Arc<dyn ActionHandler>>
    where
        F: Fn(&Document, Value) -> ActionOutcome + Send + Sync + 'static,
    {
        self.register(
            action_type,
            move |state: Document, params: Value| -> ActionFuture {
                future::ready(handler(&state, params)).boxed()
            },
        )
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

fn parse_params<T: DeserializeOwned>(action: &str, params: Value) -> Result<T, ActionError> {
    serde_json::from_value(params).map_err(|source| ActionError::InvalidParams {
        action: action.to_string(),
        source,
    })
}

fn invalid_params(action: &str, message: &str) -> ActionError {
    ActionError::InvalidParams {
        action: action.to_string(),
        source: <serde_json::Error as serde::de::Error>::custom(message),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNodePropertyParams {
    node_id: String,
    property: PropertyName,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTextParams {
    node_id: String,
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetNotesParams {
    node_id: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetClassParams {
    node_id: String,
    #[serde(alias = "class")]
    class_tag: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddChildParams {
    parent_id: String,
    #[serde(flatten)]
    node: NodeData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveNodeParams {
    node_id: String,
}

fn apply_property(state: &Document, node_id: &str, property: NodeProperty) -> ActionOutcome {
    Ok(Some(state.set_property(node_id, property)))
}

fn update_node_property(state: &Document, params: Value) -> ActionOutcome {
    let params: UpdateNodePropertyParams = parse_params(UPDATE_NODE_PROPERTY, params)?;
    let property = match (params.property, params.value) {
        (PropertyName::Notes, notes) => NodeProperty::Notes(notes),
        (PropertyName::Text, Some(text)) => NodeProperty::Text(text),
        (PropertyName::ClassTag, Some(class_tag)) => NodeProperty::ClassTag(class_tag),
        (_, None) => return Err(invalid_params(UPDATE_NODE_PROPERTY, "missing string `value`")),
    };
    apply_property(state, &params.node_id, property)
}

fn set_text(state: &Document, params: Value) -> ActionOutcome {
    let params: SetTextParams = parse_params(SET_TEXT, params)?;
    apply_property(state, &params.node_id, NodeProperty::Text(params.text))
}

fn set_notes(state: &Document, params: Value) -> ActionOutcome {
    let params: SetNotesParams = parse_params(SET_NOTES, params)?;
    apply_property(state, &params.node_id, NodeProperty::Notes(params.notes))
}

fn set_class(state: &Document, params: Value) -> ActionOutcome {
    let params: SetClassParams = parse_params(SET_CLASS, params)?;
    apply_property(state, &params.node_id, NodeProperty::ClassTag(params.class_tag))
}

fn add_child(state: &Document, params: Value) -> ActionOutcome {
    let params: AddChildParams = parse_params(ADD_CHILD, params)?;
    Ok(Some(state.add_child(&params.parent_id, params.node)?))
}

fn remove_node(state: &Document, params: Value) -> ActionOutcome {
    let params: RemoveNodeParams = parse_params(REMOVE_NODE, params)?;
    Ok(Some(state.remove_node(&params.node_id)))
}
