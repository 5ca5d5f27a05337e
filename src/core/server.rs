/// MCP Server Implementation
///
/// Transport-agnostic dispatcher: raw request bytes in, raw response bytes
/// out. It owns the tool catalog, the session auth state and the JSON-RPC
/// method table, and turns `tools/call` into action handler invocations.
///
/// `handle_request` takes `&self` and may be called concurrently from any
/// number of transports. The only state it writes is the session auth map,
/// which sits behind its own lock.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{Span, error, info, warn};

use crate::core::context::{ACCOUNT_ID_KEY, AuthConfig, REGION_KEY, create_context};
use crate::core::protocol::{
    CallToolResult, ContentItem, INTERNAL_ERROR, INVALID_PARAMS, InitializeResult, McpRequest, McpResponse, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::core::registry::{ActionMap, ActionResponse, HttpStatus, Tool, rebuild_tools};

/// The gateway's JSON-RPC dispatcher.
pub struct Server {
    name: String,
    version: String,
    description: String,
    actions: Arc<ActionMap>,
    tools: Vec<Tool>,
    auth: AuthConfig,
    excludes: HashSet<String>,
    includes: HashSet<String>,
    logger: Span,
}

impl Server {
    /// Create a server and build its initial tool catalog.
    ///
    /// # Arguments
    /// * `name` - Server name reported by `initialize`
    /// * `version` - Server version reported by `initialize`
    /// * `description` - Returned as `instructions` by `initialize` when non-empty
    /// * `actions` - Action map owned by the host application
    /// * `auth` - Environment variable names and session auth state
    /// * `logger` - Gateway logger, also handed to every action invocation
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        actions: Arc<ActionMap>,
        auth: AuthConfig,
        logger: Span,
    ) -> Self {
        let mut server = Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            actions,
            tools: Vec::new(),
            auth,
            excludes: HashSet::new(),
            includes: HashSet::new(),
            logger,
        };
        server.rebuild();
        server
    }

    /// Add names to the exclude list and rebuild the catalog.
    pub fn set_excludes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(names.into_iter().map(Into::into));
        self.rebuild();
    }

    /// Add names to the include list and rebuild the catalog.
    pub fn set_includes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(names.into_iter().map(Into::into));
        self.rebuild();
    }

    /// Seed session auth from the environment variables named in the auth config.
    ///
    /// `lookup` resolves a variable name to its value; the binary passes
    /// `std::env::var(..).ok()`. Empty values are ignored.
    pub fn load_auth_from_env<F>(&self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let sources = [
            (ACCOUNT_ID_KEY, self.auth.account_id_env.as_str()),
            (REGION_KEY, self.auth.region_env.as_str()),
        ];
        for (key, env_name) in sources {
            if env_name.is_empty() {
                continue;
            }
            if let Some(value) = lookup(env_name).filter(|v| !v.is_empty()) {
                self.auth.merge_session([(key.to_string(), value)]);
                info!(parent: &self.logger, key, env = env_name, "loaded session default from environment");
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current tool catalog.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    fn rebuild(&mut self) {
        self.tools = rebuild_tools(&self.actions, &self.excludes, &self.includes);
        info!(parent: &self.logger, count = self.tools.len(), "generated tools for MCP");
    }

    /// Handle one raw JSON-RPC request and return the encoded response.
    pub fn handle_request(&self, raw: &[u8]) -> Vec<u8> {
        let request: McpRequest = match serde_json::from_slice(raw) {
            Ok(req) => req,
            Err(e) => {
                error!(parent: &self.logger, error = %e, "failed to parse MCP request");
                return McpResponse::error(Value::Null, PARSE_ERROR, "Parse error").to_bytes();
            }
        };

        info!(parent: &self.logger, method = %request.method, id = %request.id, "received MCP request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request),
            "tools/list" => self.handle_tools_list(&request),
            "tools/call" => self.handle_tools_call(&request),
            _ => McpResponse::error(request.id.clone(), METHOD_NOT_FOUND, "Method not found"),
        };
        response.to_bytes()
    }

    /// Handle MCP initialize method.
    ///
    /// String entries of `params.auth` are merged into the session auth map;
    /// everything else in `params` is ignored. Always succeeds.
    fn handle_initialize(&self, request: &McpRequest) -> McpResponse {
        if let Some(auth) = request
            .params_object()
            .and_then(|p| p.get("auth"))
            .and_then(Value::as_object)
        {
            self.auth.merge_session(
                auth.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))),
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: false },
            },
            instructions: (!self.description.is_empty()).then(|| self.description.clone()),
        };
        self.success(request, &result)
    }

    fn handle_tools_list(&self, request: &McpRequest) -> McpResponse {
        #[derive(Serialize)]
        struct ListToolsResult<'a> {
            tools: &'a [Tool],
        }
        self.success(request, &ListToolsResult { tools: &self.tools })
    }

    /// Handle MCP tools/call method.
    ///
    /// Looks the tool up in the full action map, not the published catalog:
    /// excluding an action hides it from discovery but it stays callable.
    fn handle_tools_call(&self, request: &McpRequest) -> McpResponse {
        let id = request.id.clone();
        let Some(params) = request.params_object() else {
            return McpResponse::error(id, INVALID_PARAMS, "Invalid params");
        };
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = match params.get("arguments") {
            Some(Value::Object(args)) => args.clone(),
            _ => Map::new(),
        };

        let logged_arguments = Value::Object(arguments.clone());
        info!(parent: &self.logger, tool = tool_name, arguments = %logged_arguments, "calling tool");

        let Some(action) = self.actions.get(tool_name) else {
            return McpResponse::error(id, INVALID_PARAMS, format!("Tool not found: {tool_name}"));
        };

        let ctx = create_context(arguments, &self.auth, &self.logger);
        let (response, status) = match catch_unwind(AssertUnwindSafe(|| (action.handler)(&ctx))) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(parent: &self.logger, tool = tool_name, "action handler panicked");
                (ActionResponse::default(), 500)
            }
        };

        self.success(request, &tool_result(&response, status, &self.logger))
    }

    fn success<T: Serialize>(&self, request: &McpRequest, result: &T) -> McpResponse {
        match serde_json::to_value(result) {
            Ok(value) => McpResponse::success(request.id.clone(), value),
            Err(e) => {
                error!(parent: &self.logger, error = %e, "failed to encode result");
                McpResponse::error(request.id.clone(), INTERNAL_ERROR, "Internal error")
            }
        }
    }
}

/// Map an action's response and status onto an MCP tool result.
///
/// Action failures are tool results with `isError` set, never protocol errors.
fn tool_result(response: &ActionResponse, status: HttpStatus, logger: &Span) -> CallToolResult {
    if status >= 400 {
        let text = match &response.error {
            Some(err) => format!("Error: {} - {}", err.code, err.message),
            None => format!("Error: HTTP {status}"),
        };
        return CallToolResult {
            content: vec![ContentItem::text(text)],
            is_error: true,
        };
    }

    CallToolResult {
        content: vec![ContentItem::text(render_data(&response.data, logger))],
        is_error: false,
    }
}

/// Pretty JSON of a success payload, or a diagnostic line when it cannot be
/// encoded.
fn render_data<T: Serialize>(data: &T, logger: &Span) -> String {
    match serde_json::to_string_pretty(data) {
        Ok(json) => json,
        Err(e) => {
            warn!(parent: logger, error = %e, "failed to serialize tool result");
            format!("Success, but failed to serialize result: {e}")
        }
    }
}
