use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use skydash_bridge::{BridgeConfig, SnapshotBridge};
use skydash_fc::{ConnectionAddress, FcConfig, StreamingIngestor};
use skydash_proto::TelemetryProvider;
use skydash_sim::{SyntheticConfig, SyntheticProvider};

#[derive(Debug, Parser)]
#[command(name = "skydash", version, about = "SkyDash - drone telemetry for the dashboard")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check every config section without touching the vehicle.
    Doctor,
    /// Print one telemetry record as JSON.
    Snapshot {
        /// Wait this long after connecting before reading (live links only).
        /// Default 1000, enough for the first requested streams to arrive.
        #[arg(long)]
        settle_ms: Option<u64>,
    },
    /// Print a record per interval as JSON lines until Ctrl-C.
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum ProviderKind {
    #[default]
    Synthetic,
    Bridge,
    Mavlink,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ProviderCfg {
    kind: ProviderKind,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    provider: ProviderCfg,
    synthetic: SyntheticConfig,
    bridge: BridgeConfig,
    mavlink: FcConfig,
}

/// Live links report nothing useful until the requested streams flow.
const DEFAULT_SETTLE_MS: u64 = 1000;

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

/// The provider picked by `[provider] kind`, plus the live link behind it
/// when there is one.
struct Session {
    provider: Box<dyn TelemetryProvider>,
    ingestor: Option<Arc<StreamingIngestor>>,
}

impl Session {
    async fn open(cfg: &Config) -> Result<Self> {
        let session = match cfg.provider.kind {
            ProviderKind::Synthetic => Self {
                provider: Box::new(SyntheticProvider::new(&cfg.synthetic).context("[synthetic]")?),
                ingestor: None,
            },
            ProviderKind::Bridge => Self {
                provider: Box::new(SnapshotBridge::new(&cfg.bridge).context("[bridge]")?),
                ingestor: None,
            },
            ProviderKind::Mavlink => {
                let address = cfg.mavlink.address.as_deref().context("mavlink.address missing")?;
                let ing = Arc::new(StreamingIngestor::new(cfg.mavlink.settings()));
                ing.connect(address)
                    .await
                    .with_context(|| format!("mavlink connect {}", address))?;
                Self {
                    provider: Box::new(ing.clone()),
                    ingestor: Some(ing),
                }
            }
        };
        info!("provider: {}", session.provider.name());
        Ok(session)
    }

    async fn close(self) {
        if let Some(ing) = self.ingestor {
            ing.disconnect().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Snapshot { settle_ms } => snapshot(&cfg, settle_ms).await?,
        Command::Watch { interval_ms, count } => watch(&cfg, interval_ms, count).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting (provider={:?})", cfg.provider.kind);

    let params = cfg.synthetic.resolve().context("[synthetic]")?;
    info!(
        "doctor: synthetic {:.1}V -> {:.1}V floor, {:.3}V/call",
        params.initial_voltage, params.floor_voltage, params.drain_per_call
    );

    SnapshotBridge::new(&cfg.bridge).context("[bridge]")?;
    info!(
        "doctor: bridge {} timeout={:?}",
        cfg.bridge.url(),
        cfg.bridge.request_timeout()
    );

    match cfg.mavlink.address.as_deref() {
        Some(a) => {
            let address = ConnectionAddress::parse(a).context("mavlink.address")?;
            info!("doctor: mavlink {} {:?}", address, cfg.mavlink.settings());
        }
        None if cfg.provider.kind == ProviderKind::Mavlink => {
            anyhow::bail!("provider.kind=mavlink but mavlink.address missing")
        }
        None => warn!("doctor: no mavlink.address (only needed for kind=mavlink)"),
    }

    info!("doctor: OK");
    Ok(())
}

/// How long `snapshot` waits before reading. Zero for providers that
/// answer immediately.
fn settle_for(kind: ProviderKind, settle_ms: Option<u64>) -> Duration {
    match kind {
        ProviderKind::Mavlink => Duration::from_millis(settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
        ProviderKind::Synthetic | ProviderKind::Bridge => Duration::ZERO,
    }
}

async fn snapshot(cfg: &Config, settle_ms: Option<u64>) -> Result<()> {
    let session = Session::open(cfg).await?;
    let settle = settle_for(cfg.provider.kind, settle_ms);
    if session.ingestor.is_some() && !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    let rec = session.provider.telemetry().await;
    session.close().await;
    println!("{}", serde_json::to_string_pretty(&rec)?);
    Ok(())
}

async fn watch(cfg: &Config, interval_ms: u64, count: Option<u64>) -> Result<()> {
    let session = Session::open(cfg).await?;
    let res = print_records(session.provider.as_ref(), interval_ms, count).await;
    session.close().await;
    res
}

async fn print_records(provider: &dyn TelemetryProvider, interval_ms: u64, count: Option<u64>) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0u64;
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("listen for ctrl-c")?;
                info!("watch: interrupted after {} records", printed);
                return Ok(());
            }
            _ = ticker.tick() => {
                let rec = provider.telemetry().await;
                println!("{}", serde_json::to_string(&rec)?);
                printed += 1;
                if count.map_or(false, |n| printed >= n) {
                    return Ok(());
                }
            }
        }
    }
}
