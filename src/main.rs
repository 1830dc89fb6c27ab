use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use tutoria::config::Config;

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse::<u16>().ok();
        }
        i += 1;
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "startup", "tutoria starting: RUST_LOG='{}'", rust_log);

    let mut config = Config::from_env()?;
    let args: Vec<String> = std::env::args().collect();
    if let Some(port) = parse_port_arg(&args, "--port") {
        config.http_port = port;
    }

    tutoria::server::run(config).await
}
