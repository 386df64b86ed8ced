use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lectern_core::config::Config;
use lectern_core::{ConversationBuilder, InMemorySessionStore};
use lectern_gateway::{AppState, GatewayServer};
use lectern_llm::http::build_client;
use lectern_llm::openai::OpenAiCompatibleProvider;
use lectern_llm::{AnyProvider, LlmError, LlmProvider};
use tokio::sync::watch;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Read an EPUB chapter by chapter and ask a language model about it.
#[derive(Debug, Parser)]
#[command(name = "lectern", version, about)]
struct Cli {
    /// Path to the TOML config file [env: LECTERN_CONFIG]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to bind, overriding `server.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on, overriding `server.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_subscriber(config.logging.file.as_deref());
    tracing::info!(config = %config_path.display(), "lectern starting");

    config.validate()?;
    config.resolve_secrets();

    let provider = create_provider(&config)?;
    tracing::info!(
        provider = provider.name(),
        base_url = %config.llm.base_url,
        model = %config.llm.model,
        "chat backend configured"
    );

    let sessions = Arc::new(InMemorySessionStore::new(config.session.ttl()));
    let conversation =
        ConversationBuilder::new(config.context.persona(), config.context.policy());
    let state = AppState::new(provider, sessions, conversation, &config.server.upload_dir)
        .with_cookie_name(&config.session.cookie_name);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(&config.server.bind, config.server.port, state, shutdown_rx)
        .with_max_upload_bytes(config.server.max_upload_bytes)
        .with_sweep_interval(config.session.sweep_interval())
        .serve()
        .await?;

    tracing::info!("lectern stopped");
    Ok(())
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LECTERN_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let api_key = config
        .secrets
        .llm_api_key
        .as_ref()
        .ok_or(LlmError::MissingApiKey {
            provider: "openai-compatible",
        })
        .context("set LECTERN_LLM_API_KEY or DEEPSEEK_API_KEY")?;

    let client = build_client(
        Duration::from_secs(config.llm.connect_timeout_secs),
        Duration::from_secs(config.llm.timeout_secs),
    )?;

    let provider = OpenAiCompatibleProvider::new(
        api_key.expose().to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    )?
    .with_client(client)
    .with_max_tokens(config.llm.max_tokens);

    Ok(AnyProvider::OpenAiCompatible(provider))
}

fn init_subscriber(log_file: Option<&str>) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();

    let file_layer = log_file.and_then(|path| match open_log_file(Path::new(path)) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        ),
        Err(e) => {
            eprintln!("cannot open log file {path}: {e}, logging to stdout only");
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .init();
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use lectern_core::secret::Secret;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::parse_from(["lectern", "--config", "/etc/lectern.toml", "--port", "8080"]);
        assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/lectern.toml")));
        assert_eq!(cli.port, Some(8080));
        assert!(cli.bind.is_none());
    }

    #[test]
    fn explicit_config_path_wins() {
        assert_eq!(
            resolve_config_path(Some(Path::new("custom.toml"))),
            PathBuf::from("custom.toml")
        );
    }

    #[test]
    fn create_provider_requires_api_key() {
        let config = Config::default();
        let err = create_provider(&config).unwrap_err();
        assert!(format!("{err:#}").contains("missing API key"));
    }

    #[test]
    fn create_provider_uses_config() {
        let mut config = Config::default();
        config.llm.base_url = "http://localhost:9999/".into();
        config.llm.model = "test-model".into();
        config.secrets.llm_api_key = Some(Secret::new("sk-test"));

        let provider = create_provider(&config).unwrap();
        let AnyProvider::OpenAiCompatible(p) = &provider else {
            panic!("expected OpenAI-compatible provider");
        };
        assert_eq!(p.model(), "test-model");
        assert_eq!(p.base_url(), "http://localhost:9999");
        assert_eq!(provider.name(), "openai-compatible");
    }

    #[test]
    fn log_file_parent_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/lectern.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
