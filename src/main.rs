use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // An interrupted test attempt is abandoned, never submitted.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted.");
            lectern::observability::telemetry::shutdown_tracing();
            std::process::exit(130);
        }
    });

    let result = lectern::cli::run().await;

    lectern::observability::telemetry::shutdown_tracing();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(lectern::errors::get_exit_code(&e))
        }
    }
}
