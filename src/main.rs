//! cidata - prepare cloud-init user-data and NoCloud seed images

use std::process::ExitCode;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cidata_tool::cli;

fn init_logging() {
    // Logs go to stderr; stdout carries usage text and password prompts
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn main() -> ExitCode {
    init_logging();

    let args = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let code = cli::run(args);
    ExitCode::from(code as u8)
}
