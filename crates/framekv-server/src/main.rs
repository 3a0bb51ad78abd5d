#[cfg(feature = "alloc_mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use framekv_server::config::Config;
use framekv_server::server;

#[derive(Parser)]
#[command(name = "framekv-server")]
#[command(about = "In-memory key/value store served over TCP")]
struct Args {
    /// Port to listen on (loopback only)
    #[arg(long, env = "FRAMEKV_PORT", default_value_t = 9001)]
    port: u16,

    /// Number of workers executing commands off the I/O path
    #[arg(long, env = "FRAMEKV_WORKERS", default_value_t = 10)]
    worker_count: usize,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Config {
        port: args.port,
        worker_count: args.worker_count,
        ..Config::default()
    };
    server::run(cfg).await
}
