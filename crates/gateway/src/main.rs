use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use uag_domain::config::{Config, ConfigSeverity, CorsConfig};
use uag_gateway::cli::{Cli, Command, ConfigCommand};
use uag_gateway::router::AdapterRegistry;
use uag_gateway::state::AppState;

/// Default per-IP admission rate when no finer-grained knob is configured.
/// The per-session sliding window (§5) is the gateway's real rate limiter;
/// this is just backpressure against one client opening many connections.
const DEFAULT_PER_IP_BURST: u32 = 100;
const DEFAULT_PER_IP_PER_SECOND: u64 = 50;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = uag_gateway::cli::load_config()?;
            run_server(config).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = uag_gateway::cli::load_config()?;
            let passed = uag_gateway::cli::doctor::run(&config, &config_path)?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = uag_gateway::cli::load_config()?;
            let valid = uag_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = uag_gateway::cli::load_config()?;
            uag_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("unified-agent-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,uag_gateway=debug")))
        .json()
        .init();
}

/// Register the three CLI-backed providers. A provider gets a
/// [`uag_gateway::adapters::relay::RelayAdapter`] when `UAG_RELAY_<PROVIDER>`
/// names a launch command, otherwise the [`uag_gateway::adapters::compat::CompatAdapter`]
/// fallback. `mock` is always registered, for local testing and the
/// scenarios in §8.
fn build_adapters() -> AdapterRegistry {
    use uag_gateway::adapters::compat::CompatAdapter;
    use uag_gateway::adapters::mock::MockAdapter;
    use uag_gateway::adapters::relay::{RelayAdapter, RelayCommand};
    use uag_protocol::Provider;

    let mut adapters = AdapterRegistry::new();
    adapters.register(Provider::Mock, Arc::new(MockAdapter::new()));

    for provider in [Provider::Claude, Provider::Codex, Provider::Gemini] {
        let env_var = format!("UAG_RELAY_{}", provider.to_string().to_uppercase());
        match std::env::var(&env_var) {
            Ok(command_line) if !command_line.is_empty() => {
                let mut parts = command_line.split_whitespace();
                let program = parts.next().unwrap_or_default().to_owned();
                let args = parts.map(str::to_owned).collect::<Vec<_>>();
                tracing::info!(%provider, command = %command_line, "native-relay adapter configured");
                adapters.register(provider, Arc::new(RelayAdapter::new(provider, RelayCommand { program, args })));
            }
            _ => {
                tracing::info!(%provider, "no relay command configured, using compat adapter");
                adapters.register(provider, Arc::new(CompatAdapter::new(provider)));
            }
        }
    }

    adapters
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("unified-agent-gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let adapters = build_adapters();
    let state = AppState::build(config, adapters).context("assembling application state")?;
    state.spawn_background_tasks();

    let cors_layer = build_cors_layer(&state.config.server.cors);
    let governor_layer = GovernorLayer {
        config: Arc::new(
            GovernorConfigBuilder::default()
                .per_second(DEFAULT_PER_IP_PER_SECOND)
                .burst_size(DEFAULT_PER_IP_BURST)
                .finish()
                .expect("static governor config is always valid"),
        ),
    };

    let host = state.config.server.host.clone();
    let port = state.config.server.port;

    let app = uag_gateway::api::router(state.clone())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(DEFAULT_MAX_CONCURRENT_REQUESTS))
        .layer(governor_layer)
        .with_state(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "unified-agent-gateway listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `:*` wildcard port (`http://localhost:*`); a bare `*`
/// allows everything.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
