/// Action Registry and Tool Generation
///
/// The host application owns a map of named actions. Every exposed action that
/// passes the include/exclude policy becomes a tool in the catalog that
/// clients discover through `tools/list`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::context::{ACCOUNT_ID_KEY, ExecutionContext, REGION_KEY};
use crate::core::schema::{Describe, TypeDescriptor, generate_schema};

/// HTTP-style status code returned by an action handler.
pub type HttpStatus = u16;

/// Action handler function type.
///
/// Handlers receive the execution context built for the call and return a
/// response together with an HTTP status. They run to completion once invoked.
pub type ActionHandler = Box<dyn Fn(&ExecutionContext) -> (ActionResponse, HttpStatus) + Send + Sync>;

/// Name to action map owned by the host application.
pub type ActionMap = HashMap<String, ActionDef>;

/// Structured error carried by a failed action response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Response model shared by all action handlers.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(ErrorInfo {
                code: code.into(),
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.request_id = request_id.map(str::to_string);
        self
    }
}

/// Definition of one application action.
pub struct ActionDef {
    pub handler: ActionHandler,
    /// Shape of the handler's input, used for the tool schema.
    pub input_type: Option<TypeDescriptor>,
    pub description: String,
    /// Whether the action may appear in the tool catalog.
    pub exposed: bool,
    pub tags: BTreeSet<String>,
}

impl ActionDef {
    /// Exposed action without a declared input type.
    pub fn new<F>(description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ExecutionContext) -> (ActionResponse, HttpStatus) + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            input_type: None,
            description: description.into(),
            exposed: true,
            tags: BTreeSet::new(),
        }
    }

    /// Declare the input type from a `Describe` implementation.
    pub fn with_input<T: Describe>(self) -> Self {
        self.with_input_type(T::descriptor())
    }

    pub fn with_input_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.input_type = Some(descriptor);
        self
    }

    /// Keep the action callable but out of the tool catalog.
    pub fn hidden(mut self) -> Self {
        self.exposed = false;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

impl std::fmt::Debug for ActionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDef")
            .field("input_type", &self.input_type)
            .field("description", &self.description)
            .field("exposed", &self.exposed)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// MCP tool definition as published by `tools/list`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Whether `name` passes the catalog policy.
///
/// Exclusion always wins over inclusion; empty sets do not filter.
pub fn is_published(name: &str, action: &ActionDef, excludes: &HashSet<String>, includes: &HashSet<String>) -> bool {
    action.exposed
        && (excludes.is_empty() || !excludes.contains(name))
        && (includes.is_empty() || includes.contains(name))
}

/// Recompute the whole tool catalog.
///
/// Each published action gets its generated input schema plus the optional
/// `account_id` and `region` properties. The result is sorted by name.
pub fn rebuild_tools(actions: &ActionMap, excludes: &HashSet<String>, includes: &HashSet<String>) -> Vec<Tool> {
    let mut tools: Vec<Tool> = actions
        .iter()
        .filter(|(name, action)| is_published(name, action, excludes, includes))
        .map(|(name, action)| {
            let mut schema = generate_schema(action.input_type.as_ref());
            if let Some(props) = schema.get_mut("properties").and_then(Value::as_object_mut) {
                props.insert(
                    ACCOUNT_ID_KEY.to_string(),
                    json!({
                        "type": "string",
                        "description": "Account ID (optional, uses the environment default if unset)"
                    }),
                );
                props.insert(
                    REGION_KEY.to_string(),
                    json!({
                        "type": "string",
                        "description": "Region (optional, uses the environment default if unset)"
                    }),
                );
            }
            Tool {
                name: name.clone(),
                description: action.description.clone(),
                input_schema: schema,
            }
        })
        .collect();

    tools.sort_by(|a, b| a.name.cmp(&b.name));
    tools
}
