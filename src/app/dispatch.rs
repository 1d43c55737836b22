use crate::app::status::render_run;
use crate::cli::commands::{Cli, Commands};
use crate::config::Config;
use crate::error::SweepError;
use crate::storage::LocalFs;
use crate::store::{MetadataStore, RunRecord, SqliteStore};
use crate::sweeper::{CleanMode, SweepOptions, SweepReport, Sweeper, spawn_ctrl_c};
use crate::ui::style;
use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads a JSON array of run records and upserts each one.
pub async fn import_runs(store: &dyn MetadataStore, file: &Path) -> Result<usize> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let runs: Vec<RunRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of run records", file.display()))?;
    for run in &runs {
        store.upsert_run(run).await?;
    }
    info!(count = runs.len(), store = store.name(), "imported run records");
    Ok(runs.len())
}

fn build_sweeper(
    cli: &Cli,
    config: &Config,
    host: &str,
    store: Arc<dyn MetadataStore>,
) -> Result<Sweeper, SweepError> {
    config.validate_for_host(host)?;
    Sweeper::new(
        config,
        host,
        store,
        Arc::new(LocalFs),
        SweepOptions {
            execute: cli.execute,
            ask_confirm: cli.ask_confirm,
        },
    )
}

fn summarize(report: &SweepReport, dry_run: bool) -> Result<()> {
    let line = format!("Sweep finished: {report}");
    if report.has_failures() {
        println!("{}", style::danger(&line));
        bail!(
            "{} deletion(s) failed and {} anomaly(ies) were reported",
            report.failed,
            report.anomalies
        );
    }
    if report.declined > 0 {
        println!("{}", style::yellow(&line));
        bail!(
            "{} deletion(s) were declined at the prompt and left in place",
            report.declined
        );
    }
    if dry_run {
        println!("{}", style::yellow(&line));
    } else {
        println!("{}", style::success(&line));
    }
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let host = cli.host.clone().unwrap_or_else(|| config.identity());
    let store: Arc<dyn MetadataStore> = Arc::new(SqliteStore::open(&config.store.path).await?);

    match &cli.command {
        Commands::Import { file } => {
            let count = import_runs(store.as_ref(), file).await?;
            println!("{}", style::success(format!("Imported {count} run record(s)")));
            Ok(())
        }

        Commands::Show { number } => {
            let Some(run) = store.get_run(*number).await? else {
                bail!("run {number} is not in the metadata store");
            };
            println!("{}", render_run(&run));
            Ok(())
        }

        Commands::Run {
            number,
            delete_live,
            force,
        } => {
            let sweeper = build_sweeper(&cli, &config, &host, store)?;
            announce(&sweeper);
            sweeper.confirm_start().await?;
            let interrupt = spawn_ctrl_c(sweeper.stop_signal());
            let result = sweeper.clean_run(*number, *delete_live, *force).await;
            interrupt.abort();
            summarize(&result?, sweeper.is_dry_run())
        }

        Commands::Clean {
            mode,
            force,
            continuous,
        } => {
            let sweeper = build_sweeper(&cli, &config, &host, store)?;
            announce(&sweeper);
            sweeper.confirm_start().await?;
            let interrupt = spawn_ctrl_c(sweeper.stop_signal());
            let result = run_clean(&sweeper, *mode, *force, *continuous).await;
            interrupt.abort();
            result
        }
    }
}

async fn run_clean(sweeper: &Sweeper, mode: CleanMode, force: bool, continuous: bool) -> Result<()> {
    if continuous {
        sweeper.run_continuous(mode, force).await?;
        return Ok(());
    }
    let report = sweeper.run_mode(mode, force).await?;
    summarize(&report, sweeper.is_dry_run())
}

fn announce(sweeper: &Sweeper) {
    info!(
        host = sweeper.host(),
        shared_tier_writer = sweeper.is_shared_tier_writer(),
        dry_run = sweeper.is_dry_run(),
        "agent ready"
    );
    if sweeper.is_dry_run() {
        println!(
            "{}",
            style::yellow("Dry-run: nothing will be deleted. Pass --execute to delete.")
        );
    }
}
