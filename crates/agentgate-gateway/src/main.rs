// crates/agentgate-gateway/src/main.rs
// ============================================================================
// Binary: agentgate-gateway
// Description: Process entry point — loads configuration, builds
//              `GatewayState`, and runs the blocking HTTP listener.
// Purpose: Stay a thin wrapper; every assembly decision lives in
//          `agentgate_gateway::server::GatewayState::build`.
// Dependencies: agentgate-gateway, agentgate-config, tracing-subscriber
// ============================================================================

use std::fs;
use std::process::ExitCode;

use agentgate_config::AgentGateConfig;
use agentgate_gateway::server;
use agentgate_gateway::server::GatewayState;
use agentgate_gateway::settings::GatewaySettings;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = match AgentGateConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    let settings = match GatewaySettings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "failed to load gateway settings");
            return ExitCode::FAILURE;
        }
    };

    if let Some(pid_file) = settings.pid_file.clone() {
        if let Err(err) = fs::write(&pid_file, std::process::id().to_string()) {
            tracing::warn!(error = %err, path = %pid_file.display(), "failed to write pid file");
        }
    }

    let state = match GatewayState::build(&config, settings) {
        Ok(state) => std::sync::Arc::new(state),
        Err(err) => {
            tracing::error!(error = %err, "failed to assemble gateway state");
            return ExitCode::FAILURE;
        }
    };

    match server::serve(state) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "gateway listener exited");
            ExitCode::FAILURE
        }
    }
}
