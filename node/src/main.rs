use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, File as ConfigFile};
use heartwise_assistant::{AssistantConfig, Gateway};
use heartwise_identity::{SessionKeeper, UserStore};
use heartwise_model::{ModelBundle, Pipeline};
use heartwise_rpc::{start_server, AppState};
use rand::RngCore;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "heartwise-node")]
#[command(about = "HeartWise prediction and assistant service")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Data directory for the local store (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level when RUST_LOG is unset (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

/// Application configuration, layered: built-in defaults, then the TOML
/// file, then HEARTWISE_* environment variables, then CLI flags.
#[derive(Debug, Clone)]
struct AppConfig {
    rpc_host: String,
    rpc_port: u16,

    data_dir: String,
    db_path: String,

    scaler_path: String,
    classifier_path: String,

    session_secret: Option<String>,
    session_ttl_secs: u64,

    assistant: AssistantConfig,

    log_level: String,
    log_format: String,
}

impl AppConfig {
    fn load(cli: &Cli) -> Result<Self> {
        let resolved_path = if let Some(path) = &cli.config {
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path.clone())
        } else {
            let path = PathBuf::from("config").join("default.toml");
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix("HEARTWISE"));
        let config = builder.build()?;

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| get_string_value(&config, &["DATA_DIR", "storage.data_dir"]))
            .unwrap_or_else(|| "./data/heartwise".to_string());

        let default_db_path = format!("{data_dir}/db");

        let assistant_defaults = AssistantConfig::default();
        let preferred_models =
            get_string_value(&config, &["ASSISTANT_PREFERRED_MODELS", "assistant.preferred_models"])
                .map(|value| {
                    value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|models| !models.is_empty())
                .unwrap_or(assistant_defaults.preferred_models);

        let assistant = AssistantConfig {
            api_key: get_string_value(&config, &["ASSISTANT_API_KEY", "assistant.api_key"])
                .filter(|key| !key.trim().is_empty()),
            base_url: get_string_value(&config, &["ASSISTANT_BASE_URL", "assistant.base_url"])
                .unwrap_or(assistant_defaults.base_url),
            preferred_models,
            fallback_model: get_string_value(
                &config,
                &["ASSISTANT_FALLBACK_MODEL", "assistant.fallback_model"],
            )
            .unwrap_or(assistant_defaults.fallback_model),
            temperature: get_parsed_value(
                &config,
                &["ASSISTANT_TEMPERATURE", "assistant.temperature"],
                assistant_defaults.temperature,
            )?,
            top_p: get_parsed_value(
                &config,
                &["ASSISTANT_TOP_P", "assistant.top_p"],
                assistant_defaults.top_p,
            )?,
            top_k: get_parsed_value(
                &config,
                &["ASSISTANT_TOP_K", "assistant.top_k"],
                assistant_defaults.top_k,
            )?,
            max_output_tokens: get_parsed_value(
                &config,
                &["ASSISTANT_MAX_OUTPUT_TOKENS", "assistant.max_output_tokens"],
                assistant_defaults.max_output_tokens,
            )?,
        };

        Ok(Self {
            rpc_host: cli
                .host
                .clone()
                .or_else(|| get_string_value(&config, &["RPC_HOST", "rpc.host"]))
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            rpc_port: match cli.port {
                Some(port) => port,
                None => get_string_value(&config, &["RPC_PORT", "rpc.port"])
                    .unwrap_or_else(|| "8080".to_string())
                    .parse()?,
            },
            db_path: get_string_value(&config, &["DB_PATH", "storage.db_path"])
                .unwrap_or(default_db_path),
            data_dir,
            scaler_path: get_string_value(&config, &["SCALER_PATH", "model.scaler_path"])
                .unwrap_or_else(|| "./artifacts/scaler.json".to_string()),
            classifier_path: get_string_value(
                &config,
                &["CLASSIFIER_PATH", "model.classifier_path"],
            )
            .unwrap_or_else(|| "./artifacts/classifier.json".to_string()),
            session_secret: get_string_value(&config, &["SESSION_SECRET", "session.secret"])
                .filter(|secret| !secret.trim().is_empty()),
            session_ttl_secs: get_string_value(&config, &["SESSION_TTL_SECS", "session.ttl_secs"])
                .unwrap_or_else(|| "86400".to_string())
                .parse()?,
            assistant,
            log_level: cli
                .log_level
                .clone()
                .or_else(|| get_string_value(&config, &["LOG_LEVEL", "log.level"]))
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(&config, &["LOG_FORMAT", "log.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            anyhow::bail!("DATA_DIR must not be empty");
        }
        if self.db_path.trim().is_empty() {
            anyhow::bail!("DB_PATH must not be empty");
        }
        if self.rpc_port == 0 {
            anyhow::bail!("RPC_PORT must be greater than zero");
        }
        if self.session_ttl_secs == 0 {
            anyhow::bail!("SESSION_TTL_SECS must be greater than zero");
        }
        Ok(())
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| config.get_string(key).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_parsed_value<T: std::str::FromStr>(config: &Config, keys: &[&str], default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get_string_value(config, keys) {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid value for {}", keys[0])),
        None => Ok(default),
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

/// Load both inference artifacts. A failure degrades prediction instead
/// of stopping the process; the error is logged loudly at startup.
fn load_pipeline(config: &AppConfig) -> Pipeline {
    match ModelBundle::load(&config.scaler_path, &config.classifier_path) {
        Ok(bundle) => {
            info!(
                "loaded inference artifacts from {} and {}",
                config.scaler_path, config.classifier_path
            );
            Pipeline::new(Some(bundle))
        }
        Err(err) => {
            error!(
                "failed to load inference artifacts ({err}); prediction is disabled. \
                 Check {} and {}",
                config.scaler_path, config.classifier_path
            );
            Pipeline::new(None)
        }
    }
}

fn session_keeper(config: &AppConfig) -> SessionKeeper {
    let ttl = Duration::from_secs(config.session_ttl_secs);
    match &config.session_secret {
        Some(secret) => SessionKeeper::new(secret, ttl),
        None => {
            // Sessions will not survive a restart without a configured secret.
            warn!("SESSION_SECRET is not set; using an ephemeral random secret");
            let mut secret = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut secret);
            SessionKeeper::new(&hex::encode(secret), ttl)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli)?;
    config.validate()?;
    init_logging(&config)?;

    info!("starting heartwise-node v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = load_pipeline(&config);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data directory {}", config.data_dir))?;
    let db = sled::open(&config.db_path)
        .with_context(|| format!("failed to open identity store at {}", config.db_path))?;
    let users = Arc::new(UserStore::open(db)?);

    if config.assistant.api_key.is_none() {
        warn!("no assistant API credential configured; the chat feature is disabled");
    }
    let assistant = Arc::new(Gateway::new(config.assistant.clone()));

    let state = AppState {
        pipeline,
        users,
        sessions: session_keeper(&config),
        assistant,
        start_time: Instant::now(),
        req_count: Arc::new(AtomicUsize::new(0)),
        prediction_count: Arc::new(AtomicUsize::new(0)),
    };

    let addr = format!("{}:{}", config.rpc_host, config.rpc_port);
    start_server(state, &addr).await
}
