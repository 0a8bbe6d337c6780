use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use rust_fileserver::config::{AppState, Config};
use rust_fileserver::logger;
use rust_fileserver::server::{self, SignalHandler};

/// Streaming HTTP file server
#[derive(Parser, Debug)]
#[command(name = "rust_fileserver", version, about)]
struct Cli {
    /// Configuration file, without extension
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Listen address as host:port
    #[arg(short, long)]
    listen: Option<String>,

    /// Directory to serve
    root: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut cfg = Config::load_from(&cli.config)?;
    if let Some(listen) = cli.listen.as_deref() {
        cfg.set_listen(listen)?;
    }
    if let Some(root) = cli.root {
        cfg.files.root = root.to_string_lossy().into_owned();
    }

    logger::init(&cfg)?;

    // Tokio runtime, worker threads from config when set
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    if !std::path::Path::new(&cfg.files.root).is_dir() {
        logger::log_warning(&format!("Root '{}' is not a directory", cfg.files.root));
    }
    logger::log_server_start(&listener.local_addr()?, &cfg);

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    let state = Arc::new(AppState::new(cfg));
    server::start_server_loop(listener, state, Arc::clone(&signals.shutdown)).await?;

    logger::log_info("[Shutdown] Server stopped");
    Ok(())
}
