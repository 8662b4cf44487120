//! repronotebook - reproducibility checks and publishing for Jupyter notebooks.

mod colors;
mod pipeline;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use repro_core::{AbortHandle, RunnerConfig, SystemRunner};
use repro_rocrate::ArchiveStrategy;
use repro_zenodo::{PublishError, ZenodoClient, ZenodoConfig};

use crate::pipeline::{Pipeline, PipelineOptions, Publisher};
use crate::progress::TerminalProgress;

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "repronotebook")]
#[command(about = "Check, package and publish Jupyter notebooks reproducibly")]
#[command(version)]
struct Cli {
    /// A notebook (.ipynb) or a directory searched recursively for notebooks
    path: PathBuf,

    /// Stop the whole run when a notebook has style issues
    #[arg(long)]
    fail_on_style: bool,

    /// Execute each notebook in an isolated conda environment
    #[arg(long)]
    use_conda: bool,

    /// Remove the environment after execution
    #[arg(long)]
    remove_env: bool,

    /// Build an RO-Crate archive for each notebook
    #[arg(long)]
    generate_rocrate: bool,

    /// How the RO-Crate metadata is built (manual or library)
    #[arg(long, default_value = "manual")]
    rocrate_method: ArchiveStrategy,

    /// Upload the archive to Zenodo without publishing
    #[arg(long)]
    upload: bool,

    /// Upload and publish the archive, minting a DOI
    #[arg(long)]
    publish: bool,

    /// Use the Zenodo sandbox instead of production
    #[arg(long)]
    sandbox: bool,

    /// Author recorded in archives and depositions
    #[arg(long, default_value = "Unknown")]
    author: String,

    /// Zenodo access token (defaults to ZENODO_TOKEN)
    #[arg(long)]
    zenodo_token: Option<String>,

    /// Use this environment name instead of a per-run one
    #[arg(long)]
    env_name: Option<String>,

    /// Seconds before an external tool is killed
    #[arg(long, default_value = "3600")]
    tool_timeout: u64,

    /// Seconds before a Zenodo request times out
    #[arg(long, default_value = "60")]
    http_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            fail_on_style: self.fail_on_style,
            use_conda: self.use_conda,
            remove_env: self.remove_env,
            archive: self.generate_rocrate.then_some(self.rocrate_method),
            upload: self.upload || self.publish,
            finalize: self.publish,
            author: self.author.clone(),
            env_name: self.env_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let (message, code) = describe(&err);
            eprintln!("{} {}", colors::Tone::Bad.paint_err("error:"), message);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let options = cli.options();
    options.validate()?;

    // Credentials are checked before any notebook is touched.
    let publisher = if options.publishes() {
        let config = ZenodoConfig::for_sandbox(cli.sandbox).with_timeout(cli.http_timeout);
        let config = match &cli.zenodo_token {
            Some(token) => config.with_token(token),
            None => config,
        };
        Some(Publisher {
            client: ZenodoClient::new(config)?,
            finalize: options.finalize,
        })
    } else {
        None
    };

    let abort = AbortHandle::new();
    let on_interrupt = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{}",
                colors::Tone::Warn.paint_err("Interrupted, stopping after the current step")
            );
            on_interrupt.abort();
        }
    });

    let runner = SystemRunner::new(
        RunnerConfig::default().with_timeout(Duration::from_secs(cli.tool_timeout)),
        abort.clone(),
    );
    let pipeline = Pipeline::new(options, runner, publisher, abort);

    let summary = pipeline.run(&cli.path, &TerminalProgress).await?;
    progress::print_summary(&summary);
    Ok(summary.exit_code())
}

/// Error message with its recovery hint, and the exit code it maps to.
fn describe(err: &anyhow::Error) -> (String, u8) {
    if err.downcast_ref::<pipeline::UsageError>().is_some() {
        return (err.to_string(), EXIT_USAGE);
    }
    if let Some(core) = err.downcast_ref::<repro_core::Error>() {
        let code = match core {
            repro_core::Error::InvalidInput(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        };
        return (core.with_hint(), code);
    }
    if let Some(publish) = err.downcast_ref::<PublishError>() {
        let code = match publish {
            PublishError::MissingCredential => EXIT_USAGE,
            _ => EXIT_FAILURE,
        };
        let message = match publish.hint() {
            Some(hint) => format!("{} (hint: {})", publish, hint),
            None => publish.to_string(),
        };
        return (message, code);
    }
    (format!("{:#}", err), EXIT_FAILURE)
}
