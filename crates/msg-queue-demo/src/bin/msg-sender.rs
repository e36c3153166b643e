use clap::Parser;
use msg_queue_demo::cli::SenderCli;
use msg_queue_demo::logging::init_logging;
use msg_queue_demo::sender;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = SenderCli::parse();

    let result = match init_logging(&cli.logging) {
        Ok(()) => sender::run(&cli).await,
        Err(e) => Err(e),
    };

    // Exit with a code that tells configuration and queue failures apart
    if let Err(e) = result {
        error!(exit_code = e.exit_code(), "Sender failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
