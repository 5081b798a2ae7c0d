use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    encounter_ledger::init_tracing();
    match encounter_ledger::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
