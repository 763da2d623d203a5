use monitoring_gateway::{api, config::GatewayConfig, logging, metrics};
use tracing::error;

#[tokio::main]
async fn main() {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    if let Err(e) = logging::init_logger(config.log_format) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Initialize metrics
    metrics::init_metrics();

    if let Err(e) = api::start_server(config).await {
        error!("Gateway stopped: {}", e);
        std::process::exit(1);
    }
}
