/// Execution Context Adapter
///
/// Tool calls arrive as a loose JSON argument object. Action handlers expect
/// the shape of an HTTP request instead: headers, a body, query-style params.
/// This module builds that shape once per call as a typed `ExecutionContext`.

use actix_web::http::Method;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{Span, debug, warn};

use crate::core::error::BindError;

pub const ACCOUNT_ID_KEY: &str = "account_id";
pub const REGION_KEY: &str = "region";
pub const REQUEST_ID_KEY: &str = "request_id";

/// Header carrying the caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const ACCOUNT_ID_HEADER: &str = "account_id";
const REGION_HEADER: &str = "region";

/// Path of the synthetic request handed to actions.
pub const SYNTHETIC_PATH: &str = "/mcp";

/// Authentication defaults for a session.
///
/// The two `*_env` fields name the environment variables that seed the
/// session at startup. `session_auth` is the only protocol-session state kept
/// in memory; it is merged into by `initialize` and read on every tool call.
#[derive(Debug, Default)]
pub struct AuthConfig {
    pub account_id_env: String,
    pub region_env: String,
    session_auth: RwLock<HashMap<String, String>>,
}

impl AuthConfig {
    pub fn new(account_id_env: impl Into<String>, region_env: impl Into<String>) -> Self {
        Self {
            account_id_env: account_id_env.into(),
            region_env: region_env.into(),
            session_auth: RwLock::new(HashMap::new()),
        }
    }

    /// Value stored in the session auth map under `key`.
    pub fn session_value(&self, key: &str) -> Option<String> {
        self.session_auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Merge entries into the session auth map. Concurrent merges are
    /// serialized by the write lock; the last writer of a key wins.
    pub fn merge_session<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut session = self
            .session_auth
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        session.extend(entries);
    }

    pub fn session_snapshot(&self) -> HashMap<String, String> {
        self.session_auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Request body formats a handler may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingFormat {
    Json,
    Xml,
    Yaml,
    Form,
    Query,
    Header,
    MsgPack,
    ProtoBuf,
}

/// Request object for handlers written against an HTTP request.
#[derive(Debug, Clone)]
pub struct SyntheticRequest {
    pub method: Method,
    pub path: &'static str,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Everything an action handler gets for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub logger: Span,
    /// HTTP view of the resolved values. Values a header cannot carry are
    /// absent here; the accessors below always see them.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Multi-value query-parameter view of the string arguments.
    pub params: HashMap<String, Vec<String>>,
    pub request: SyntheticRequest,
    account_id: Option<String>,
    region: Option<String>,
    request_id: Option<String>,
}

impl ExecutionContext {
    /// Decode the body as JSON into `T`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode the body in the requested format.
    ///
    /// Only JSON is supported: every other format falls back to JSON decoding.
    pub fn bind_with<T: DeserializeOwned>(&self, format: BindingFormat) -> Result<T, BindError> {
        if format != BindingFormat::Json {
            debug!(parent: &self.logger, ?format, "binding format not supported, decoding as JSON");
        }
        self.bind()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

/// Build the execution context for one tool call.
///
/// # Arguments
/// * `arguments` - The `arguments` object of the tool call; consumed
/// * `auth` - Session auth used when the call does not carry its own values
/// * `logger` - Gateway logger attached to the context
///
/// `account_id`, `region` and `request_id` are lifted out of the arguments
/// when they are strings and kept verbatim on the context, mirrored into
/// headers where possible. What remains becomes the JSON body.
pub fn create_context(mut arguments: Map<String, Value>, auth: &AuthConfig, logger: &Span) -> ExecutionContext {
    let account_id = take_string(&mut arguments, ACCOUNT_ID_KEY).or_else(|| auth.session_value(ACCOUNT_ID_KEY));
    let region = take_string(&mut arguments, REGION_KEY).or_else(|| auth.session_value(REGION_KEY));
    let request_id = take_string(&mut arguments, REQUEST_ID_KEY);

    let mut headers = HeaderMap::new();
    for (name, value) in [
        (ACCOUNT_ID_HEADER, &account_id),
        (REGION_HEADER, &region),
        (REQUEST_ID_HEADER, &request_id),
    ] {
        if let Some(v) = value {
            set_header(&mut headers, name, v, logger);
        }
    }

    let params = arguments
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), vec![s.to_string()])))
        .collect();

    let body = match serde_json::to_vec(&Value::Object(arguments)) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            warn!(parent: logger, error = %e, "failed to encode tool arguments");
            Bytes::from_static(b"{}")
        }
    };

    let request = SyntheticRequest {
        method: Method::POST,
        path: SYNTHETIC_PATH,
        headers: headers.clone(),
        body: body.clone(),
    };

    ExecutionContext {
        logger: logger.clone(),
        headers,
        body,
        params,
        request,
        account_id,
        region,
        request_id,
    }
}

fn take_string(arguments: &mut Map<String, Value>, key: &str) -> Option<String> {
    match arguments.get(key) {
        Some(Value::String(_)) => match arguments.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str, logger: &Span) {
    match HeaderValue::from_bytes(value.as_bytes()) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(_) => debug!(parent: logger, header = name, "value not representable as a header, kept on the context only"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    #[test]
    fn explicit_arguments_win_and_are_removed_from_body() {
        let auth = AuthConfig::new("A", "R");
        auth.merge_session([
            ("account_id".to_string(), "session-acct".to_string()),
            ("region".to_string(), "session-region".to_string()),
        ]);

        let ctx = create_context(
            args(json!({ "account_id": "arg-acct", "region": "eu-1", "request_id": "req-7", "name": "x" })),
            &auth,
            &Span::none(),
        );

        assert_eq!(ctx.account_id(), Some("arg-acct"));
        assert_eq!(ctx.region(), Some("eu-1"));
        assert_eq!(ctx.request_id(), Some("req-7"));
        let body: Value = serde_json::from_slice(&ctx.body).unwrap();
        assert_eq!(body, json!({ "name": "x" }));
    }

    #[test]
    fn session_auth_fills_missing_values() {
        let auth = AuthConfig::new("A", "R");
        auth.merge_session([("account_id".to_string(), "session-acct".to_string())]);

        let ctx = create_context(Map::new(), &auth, &Span::none());

        assert_eq!(ctx.account_id(), Some("session-acct"));
        assert_eq!(ctx.region(), None);
        assert_eq!(ctx.request_id(), None);
        assert_eq!(&ctx.body[..], b"{}");
    }

    #[test]
    fn non_string_auth_argument_stays_in_body() {
        let auth = AuthConfig::new("A", "R");
        auth.merge_session([("account_id".to_string(), "fallback".to_string())]);

        let ctx = create_context(args(json!({ "account_id": 42 })), &auth, &Span::none());

        assert_eq!(ctx.account_id(), Some("fallback"));
        let body: Value = serde_json::from_slice(&ctx.body).unwrap();
        assert_eq!(body, json!({ "account_id": 42 }));
    }

    #[test]
    fn params_hold_only_string_arguments() {
        let ctx = create_context(
            args(json!({ "q": "rust", "limit": 10, "flags": ["a"] })),
            &AuthConfig::default(),
            &Span::none(),
        );

        assert_eq!(ctx.params.len(), 1);
        assert_eq!(ctx.params["q"], vec!["rust".to_string()]);
    }

    #[test]
    fn synthetic_request_mirrors_context() {
        let ctx = create_context(args(json!({ "request_id": "r1", "k": "v" })), &AuthConfig::default(), &Span::none());

        assert_eq!(ctx.request.method, Method::POST);
        assert_eq!(ctx.request.path, "/mcp");
        assert_eq!(ctx.request.body, ctx.body);
        assert_eq!(
            ctx.request.headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()),
            Some("r1")
        );
    }

    #[test]
    fn values_headers_cannot_carry_are_kept() {
        let auth = AuthConfig::new("A", "R");
        auth.merge_session([("account_id".to_string(), "账户-1".to_string())]);

        let ctx = create_context(
            args(json!({ "request_id": "line1\nline2", "region": "eu\u{7f}" })),
            &auth,
            &Span::none(),
        );

        assert_eq!(ctx.account_id(), Some("账户-1"));
        assert_eq!(ctx.request_id(), Some("line1\nline2"));
        assert_eq!(ctx.region(), Some("eu\u{7f}"));
        assert!(ctx.headers.get(REQUEST_ID_HEADER).is_none());
        assert_eq!(&ctx.body[..], b"{}");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Query {
        k: String,
        n: u8,
    }

    #[test]
    fn bind_with_any_format_decodes_json() {
        let ctx = create_context(args(json!({ "k": "v", "n": 3 })), &AuthConfig::default(), &Span::none());
        let expected = Query { k: "v".to_string(), n: 3 };

        assert_eq!(ctx.bind::<Query>().unwrap(), expected);
        assert_eq!(ctx.bind_with::<Query>(BindingFormat::Xml).unwrap(), expected);
        assert_eq!(ctx.bind_with::<Query>(BindingFormat::Form).unwrap(), expected);
    }

    #[test]
    fn bind_reports_shape_mismatch() {
        let ctx = create_context(args(json!({ "k": 1 })), &AuthConfig::default(), &Span::none());
        assert!(matches!(ctx.bind::<Query>(), Err(BindError::Json(_))));
    }
}
