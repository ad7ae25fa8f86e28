//! canvas-dl CLI - mirrors Canvas LMS course files to a local directory.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    canvas_dl::cli::run(&args).await
}
