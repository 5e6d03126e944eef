use clap::Parser;

use brokerdesk::cli::{Cli, run};
use brokerdesk::error::{Error, RefusalNotice};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    brokerdesk::bootstrap::load_brokerdesk_env();
    brokerdesk::bootstrap::init_tracing(cli.json_logs);

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            // Authoritative refusals are shown as a structured notice.
            if let Some(notice) = err.downcast_ref::<Error>().and_then(RefusalNotice::from_error) {
                println!("{}", notice.to_status_line());
                eprintln!("Refused: {}", notice.message);
                return std::process::ExitCode::from(2);
            }
            eprintln!("Error: {err:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
