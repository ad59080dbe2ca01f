use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match porticod::run_daemon().await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(error) => {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "porticod: {error}");
            ExitCode::FAILURE
        }
    }
}
