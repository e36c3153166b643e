use clap::Parser;
use msg_queue_demo::cli::ConfiguredReceiverCli;
use msg_queue_demo::logging::init_logging;
use msg_queue_demo::receiver;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = ConfiguredReceiverCli::parse();

    let result = match init_logging(&cli.logging) {
        Ok(()) => receiver::run_configured(&cli).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(exit_code = e.exit_code(), "Receiver failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
