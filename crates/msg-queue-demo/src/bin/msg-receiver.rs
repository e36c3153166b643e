use clap::Parser;
use msg_queue_demo::cli::ReceiverCli;
use msg_queue_demo::logging::init_logging;
use msg_queue_demo::receiver;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = ReceiverCli::parse();

    let result = match init_logging(&cli.logging) {
        Ok(()) => receiver::run(&cli).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(exit_code = e.exit_code(), "Receiver failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
