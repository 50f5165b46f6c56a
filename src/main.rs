use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio::net::TcpListener;
use tracing::info;

use gpu_monitor::config::{self, Config, load_config, load_config_from_path};
use gpu_monitor::server::{self, AppState};
use gpu_monitor::system::collector::Collector;
use gpu_monitor::system::platform;
use gpu_monitor::system::smi::{NvidiaSmi, SmiSource};
use gpu_monitor::system::snapshot::SnapshotStore;
use gpu_monitor::{diagnose, logging};

#[derive(Parser)]
#[command(
    name = "gpu-monitor",
    about = "Serve nvidia-smi GPU and process utilization over HTTP/JSON"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Collection interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// nvidia-smi binary to invoke
    #[arg(long, global = true)]
    smi_path: Option<PathBuf>,

    /// Health check always reports healthy (also enabled by TESTING=true)
    #[arg(long, default_value_t = false)]
    test_mode: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print raw nvidia-smi output and driver-mapped processes, then exit
    Diagnose,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json)?;
    let config = load_config_for_cli(&cli);

    let smi: Arc<dyn SmiSource> = Arc::new(NvidiaSmi::new(&config.collector.smi_path));
    let inspector = platform::native();

    if let Some(Command::Diagnose) = cli.command {
        let mut stdout = std::io::stdout().lock();
        return diagnose::run(
            smi.as_ref(),
            inspector.as_ref(),
            &config.collector.driver_marker,
            &mut stdout,
        )
        .wrap_err("failed to write diagnostics");
    }

    run(config, smi, inspector).await
}

async fn run(
    config: Config,
    smi: Arc<dyn SmiSource>,
    inspector: Arc<dyn platform::ProcessInspector>,
) -> Result<()> {
    if config.collector.interval_ms == 0 {
        return Err(eyre!("collector interval must be greater than 0"));
    }

    let store = SnapshotStore::new();
    let collector = Collector::new(
        smi.clone(),
        inspector,
        config.collector.driver_marker.clone(),
        config.collector.name_rules(),
    );
    tokio::spawn(collector.run(store.clone(), config.collector.interval()));

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("failed to bind {address}"))?;
    info!(%address, test_mode = config.test_mode, "serving GPU data");

    let state = AppState {
        store,
        smi,
        test_mode: config.test_mode,
    };
    server::serve(listener, state, shutdown_signal()).await?;

    info!("shut down");
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(interval) = cli.interval_ms {
        config.collector.interval_ms = interval;
    }
    if let Some(ref path) = cli.smi_path {
        config.collector.smi_path = path.clone();
    }
    let testing_env = std::env::var(config::TESTING_ENV).ok();
    config.test_mode |= cli.test_mode || config::testing_flag(testing_env.as_deref());

    config
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
