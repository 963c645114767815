use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use hcb::chain::{self, MiningOptions, MiningOutcome};
use hcb::error::{HcbError, Result, UsageKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "hcb",
    version,
    about = "Build and verify an increasing-difficulty proof-of-work hash chain",
    override_usage = "hcb MESSAGE FILE | --continue FILE | --check FILE"
)]
struct Cli {
    /// Verify, normalize and keep mining the chain in FILE
    #[arg(
        long = "continue",
        value_name = "FILE",
        num_args = 0..=1,
        conflicts_with = "check"
    )]
    continue_file: Option<Option<PathBuf>>,

    /// Verify the chain in FILE without modifying it
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    check: Option<Option<PathBuf>>,

    /// Stop after mining the block of this difficulty
    #[arg(long, value_name = "DIFFICULTY", conflicts_with = "check")]
    until: Option<u32>,

    /// Print the --check report as JSON
    #[arg(long, requires = "check")]
    json: bool,

    /// Message that starts a new chain (single line)
    #[arg(conflicts_with_all = ["continue_file", "check"])]
    message: Option<String>,

    /// File to write the new chain to
    file: Option<PathBuf>,
}

enum Mode {
    Start { message: String, file: PathBuf },
    Continue(PathBuf),
    Check(PathBuf),
}

impl Cli {
    fn mode(&self) -> Result<Mode> {
        if let Some(file) = &self.continue_file {
            return file.clone().map(Mode::Continue).ok_or_else(|| {
                HcbError::usage(UsageKind::MissingContinueFile, "missing FILE after --continue")
            });
        }
        if let Some(file) = &self.check {
            return file.clone().map(Mode::Check).ok_or_else(|| {
                HcbError::usage(UsageKind::MissingCheckFile, "missing FILE after --check")
            });
        }
        match (&self.message, &self.file) {
            (Some(message), Some(file)) => Ok(Mode::Start {
                message: message.clone(),
                file: file.clone(),
            }),
            (Some(_), None) => Err(HcbError::usage(
                UsageKind::MissingChainFile,
                "missing FILE after MESSAGE",
            )),
            _ => Err(HcbError::usage(
                UsageKind::MissingParameter,
                "missing parameter",
            )),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(HcbError::usage(UsageKind::Invalid, "").exit_code());
            }
        },
    };

    let result = match cli.mode() {
        Ok(Mode::Check(file)) => cmd_check(&file, cli.json),
        Ok(Mode::Start { message, file }) => {
            let options = MiningOptions { until: cli.until };
            cmd_mine(move |stop| chain::start(&file, &message, options, stop)).await
        }
        Ok(Mode::Continue(file)) => {
            let options = MiningOptions { until: cli.until };
            cmd_mine(move |stop| chain::resume(&file, options, stop)).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if matches!(e, HcbError::Usage { .. }) {
            eprintln!();
            eprintln!("{}", Cli::command().render_help());
        }
        std::process::exit(e.exit_code());
    }
}

fn cmd_check(file: &std::path::Path, json: bool) -> Result<()> {
    let tip = chain::check(file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tip)?);
    } else {
        println!("HCB file is valid.");
        print!("{}", tip);
    }
    Ok(())
}

/// Run a mining job on a blocking thread; Ctrl-C raises its stop flag so it
/// can checkpoint and return.
async fn cmd_mine<F>(job: F) -> Result<()>
where
    F: FnOnce(&AtomicBool) -> Result<MiningOutcome> + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));

    let watcher = {
        let stop = stop.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::warn!("Ctrl-C received, stopping at the current nonce");
                    stop.store(true, Ordering::Relaxed);
                }
                Err(e) => log::error!("cannot listen for Ctrl-C: {}", e),
            }
        })
    };

    let worker = {
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || job(&stop))
    };
    let outcome = worker.await.map_err(std::io::Error::other)?;
    watcher.abort();

    match outcome? {
        MiningOutcome::Finished { blocks } => log::info!("done: chain holds {} blocks", blocks),
        MiningOutcome::Interrupted { difficulty, cursor } => log::info!(
            "stopped while mining difficulty {}; continue later to resume at nonce {}",
            difficulty,
            cursor
        ),
    }
    Ok(())
}
