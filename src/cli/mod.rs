//! Command-line front end: argument parsing, config merging and reporting.

mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use console::style;

use crate::{AppConfig, ContainerMode, DownloadConfig, DownloadProgress, Error, Result, RunOptions};

pub use progress::{CliProgress, format_bytes, format_elapsed, print_summary};

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub token: String,
    pub domain: String,
    pub user_id: String,
    pub from: Option<ContainerMode>,
    pub output_dir: Option<PathBuf>,
    pub all: bool,
    pub parallel: Option<usize>,
    pub no_submissions: bool,
    pub config_path: Option<PathBuf>,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Download(CliArgs),
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("{flag} needs a value")))
}

/// Parses the arguments that follow the program name.
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown options, missing or malformed
/// values, or a wrong number of positional arguments.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut positional = Vec::new();
    let mut from = None;
    let mut output_dir = None;
    let mut all = false;
    let mut parallel = None;
    let mut no_submissions = false;
    let mut config_path = None;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-f" | "--from" => {
                i += 1;
                from = Some(value(args, i, arg)?.parse::<ContainerMode>()?);
            }
            "-o" | "--output" => {
                i += 1;
                output_dir = Some(PathBuf::from(value(args, i, arg)?));
            }
            "-p" | "--parallel" => {
                i += 1;
                let raw = value(args, i, arg)?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| Error::Config(format!("invalid {arg} value '{raw}'")))?;
                parallel = Some(n);
            }
            "-c" | "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(value(args, i, arg)?));
            }
            "--all" => all = true,
            "--no-submissions" => no_submissions = true,
            "-h" | "--help" => return Ok(Command::Help),
            other if !other.starts_with('-') || other == "-" => positional.push(other.to_string()),
            other => return Err(Error::Config(format!("unknown option: {other}"))),
        }
        i += 1;
    }

    let [token, domain, user_id]: [String; 3] = positional.try_into().map_err(|got: Vec<_>| {
        Error::Config(format!(
            "expected TOKEN DOMAIN USER_ID, got {} argument(s)",
            got.len()
        ))
    })?;

    Ok(Command::Download(CliArgs {
        token,
        domain,
        user_id,
        from,
        output_dir,
        all,
        parallel,
        no_submissions,
        config_path,
    }))
}

impl CliArgs {
    /// Applies command-line flags over the file configuration.
    #[must_use]
    pub fn apply(&self, config: AppConfig) -> (RunOptions, DownloadConfig) {
        let AppConfig { mut download, mut run } = config;
        if let Some(from) = self.from {
            run = run.with_from(from);
        }
        if let Some(dir) = &self.output_dir {
            run = run.with_output_dir(dir.clone());
        }
        if self.all {
            run = run.with_all(true);
        }
        if self.no_submissions {
            run = run.with_submissions(false);
        }
        if let Some(n) = self.parallel {
            download = download.with_concurrent_files(n);
        }
        (run, download)
    }
}

/// Prints usage to stderr.
pub fn print_usage() {
    eprintln!("Usage: canvas-dl [OPTIONS] <TOKEN> <DOMAIN> <USER_ID>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <TOKEN>              Canvas access token");
    eprintln!("  <DOMAIN>             Canvas host, e.g. school.instructure.com");
    eprintln!("  <USER_ID>            Canvas user id, used for submissions");
    eprintln!();
    eprintln!("Options:");
    eprintln!(
        "  -f, --from <SOURCE>  modules, folders, submissions or both (default: both)"
    );
    eprintln!(
        "  -o, --output <DIR>   Output directory (default: {})",
        crate::config::DEFAULT_OUTPUT_DIR
    );
    eprintln!("      --all            Download every course, not only favourites");
    eprintln!(
        "  -p, --parallel <N>   Concurrent file downloads (default: {})",
        DownloadConfig::default().concurrent_files
    );
    eprintln!("      --no-submissions Do not download your submission attachments");
    eprintln!(
        "  -c, --config <PATH>  Config file (default: {})",
        AppConfig::default_path().display()
    );
    eprintln!("  -h, --help           Show this help");
}

/// Runs the command line with the given arguments (program name excluded).
///
/// Exits with failure on bad arguments, an unreadable config file, or a
/// run that could not list courses.
pub async fn run(args: &[String]) -> ExitCode {
    let cli = match parse_args(args) {
        Ok(Command::Help) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Download(cli)) => cli,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let config = match AppConfig::load(cli.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            return ExitCode::FAILURE;
        }
    };
    let (options, download) = cli.apply(config);

    println!(
        "Downloading {} from {} courses into {}",
        options.from,
        if options.all { "all" } else { "favourite" },
        options.output_dir.display()
    );

    let progress = Arc::new(CliProgress::new());
    let reporter: Arc<dyn DownloadProgress> = progress.clone();
    let result = crate::run(
        &cli.token,
        &cli.domain,
        &cli.user_id,
        &options,
        &download,
        reporter,
    )
    .await;
    progress.finish();

    match result {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Run aborted: {e}");
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
