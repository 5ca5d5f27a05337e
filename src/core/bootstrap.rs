/// Gateway Bootstrap
///
/// Turns a configuration and the host application's action map into a
/// running gateway on the configured transport(s).

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::{GatewayConfig, TransportMode};
use crate::core::context::AuthConfig;
use crate::core::error::GatewayError;
use crate::core::logging::gateway_logger;
use crate::core::registry::ActionMap;
use crate::core::server::Server;
use crate::transport::{SseTransport, StdioTransport, Transport};

/// Build the dispatcher for `actions`.
///
/// `lookup` resolves the session-default environment variables named in
/// the configuration.
pub fn build_server<F>(config: &GatewayConfig, actions: ActionMap, lookup: F) -> Result<Server, GatewayError>
where
    F: Fn(&str) -> Option<String>,
{
    if actions.is_empty() {
        return Err(GatewayError::NoActions);
    }

    let logger = gateway_logger(&config.name);
    let auth = AuthConfig::new(config.account_id_env.clone(), config.region_env.clone());
    let mut server = Server::new(
        config.name.clone(),
        config.version.clone(),
        config.description.clone(),
        Arc::new(actions),
        auth,
        logger,
    );

    if !config.exclude_actions.is_empty() {
        server.set_excludes(config.exclude_actions.iter().cloned());
    }
    if !config.include_actions.is_empty() {
        server.set_includes(config.include_actions.iter().cloned());
    }
    server.load_auth_from_env(lookup);

    Ok(server)
}

/// Run the gateway until its transport finishes.
///
/// - stdio: returns at end of input
/// - sse: returns after SIGINT or SIGTERM and a graceful stop
/// - both: SSE in the background while stdio runs in the foreground; SSE
///   is stopped once stdio ends or a shutdown signal arrives
pub async fn bootstrap(config: GatewayConfig, actions: ActionMap) -> Result<(), GatewayError> {
    let server = Arc::new(build_server(&config, actions, |key| std::env::var(key).ok())?);

    info!(
        name = %config.name,
        version = %config.version,
        transport = ?config.transport,
        tools = server.tools().len(),
        "starting MCP gateway"
    );

    match config.transport {
        TransportMode::Stdio => {
            StdioTransport::stdio(server).start().await?;
        }
        TransportMode::Sse => {
            let sse = SseTransport::new(server, config.bind_addr(), config.workers);
            sse.start().await?;
            shutdown_signal().await;
            sse.stop().await?;
        }
        TransportMode::Both => {
            let sse = SseTransport::new(Arc::clone(&server), config.bind_addr(), config.workers);
            sse.start().await?;
            let stdio = StdioTransport::stdio(server);
            let stdio_result = tokio::select! {
                result = stdio.start() => result,
                _ = shutdown_signal() => stdio.stop().await,
            };
            sse.stop().await?;
            stdio_result?;
        }
    }

    info!("MCP gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C (SIGINT) or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::{ActionDef, ActionResponse};
    use serde_json::json;

    fn actions() -> ActionMap {
        let mut actions = ActionMap::new();
        for name in ["alpha", "beta", "gamma"] {
            actions.insert(
                name.to_string(),
                ActionDef::new(name, |_| (ActionResponse::ok(json!(null)), 200)),
            );
        }
        actions
    }

    #[test]
    fn empty_action_map_is_rejected() {
        let result = build_server(&GatewayConfig::default(), ActionMap::new(), |_| None);
        assert!(matches!(result, Err(GatewayError::NoActions)));
    }

    #[tokio::test]
    async fn bootstrap_rejects_empty_action_map_before_binding() {
        let result = bootstrap(GatewayConfig::default(), ActionMap::new()).await;
        assert!(matches!(result, Err(GatewayError::NoActions)));
    }

    #[test]
    fn filters_from_config_shape_the_catalog() {
        let config = GatewayConfig {
            exclude_actions: vec!["beta".to_string()],
            include_actions: vec!["alpha".to_string(), "beta".to_string()],
            ..GatewayConfig::default()
        };
        let server = build_server(&config, actions(), |_| None).unwrap();

        let names: Vec<_> = server.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["alpha"]);
    }

    #[test]
    fn session_defaults_come_from_configured_variables() {
        let config = GatewayConfig {
            account_id_env: "ACME_ACCOUNT".to_string(),
            ..GatewayConfig::default()
        };
        let server = build_server(&config, actions(), |key| match key {
            "ACME_ACCOUNT" => Some("acct-9".to_string()),
            "GATEWAY_REGION" => Some("eu-west-1".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(server.auth().session_value("account_id").as_deref(), Some("acct-9"));
        assert_eq!(server.auth().session_value("region").as_deref(), Some("eu-west-1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_signal_resolves_shutdown() {
        use std::time::Duration;
        use tokio::signal::unix::{SignalKind, signal};

        // Replaces the default disposition so SIGTERM cannot kill the test run.
        let _registered = signal(SignalKind::terminate()).unwrap();
        let waiter = tokio::spawn(shutdown_signal());
        let pid = std::process::id().to_string();

        let resolved = tokio::time::timeout(Duration::from_secs(5), async {
            while !waiter.is_finished() {
                std::process::Command::new("kill").args(["-TERM", &pid]).status().unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(resolved.is_ok(), "SIGTERM did not resolve the shutdown future");
    }
}
