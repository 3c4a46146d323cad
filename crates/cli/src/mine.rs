//! The mining subcommands (`history`, `commits`, `replay`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use mergemine_core::config::MinerConfig;
use mergemine_core::git::GitRepo;
use mergemine_core::merge::git_merge_file::git_available;
use mergemine_core::merge::{build_engine, EngineKind};
use mergemine_core::output::{LedgerWriter, Materializer, OutputLayout, RunSummary};
use mergemine_core::path_filter::PathFilter;
use mergemine_core::pipeline::{CommitSource, Pipeline, RunStats};
use mergemine_core::scenario::ScenarioFilter;

use crate::style;

pub fn cmd_mine(config: &MinerConfig, source: &CommitSource) -> Result<()> {
    if config.mining.engine == EngineKind::Git && !git_available() {
        anyhow::bail!("`git` was not found on PATH; install it or pass --engine diffy");
    }
    if let CommitSource::Ledger(ledger) = source {
        check_replay_source(config, ledger)?;
    }

    let repo = GitRepo::open_or_clone(&config.repository.path, config.repository.url.as_deref())
        .context("failed to open repository")?;

    let layout = OutputLayout::new(&config.output.root);
    layout.prepare(config.output.clean).context("failed to prepare output directory")?;
    let ledger = LedgerWriter::open(config.ledger_path(), config.output.clean)
        .context("failed to open ledger")?;

    let engine = build_engine(config.mining.engine, config.merge_timeout())
        .context("failed to set up merge engine")?;
    let paths = PathFilter::from(&config.mining);
    let materializer =
        Materializer::new(layout, ledger, ScenarioFilter::new(config.mining.threshold));
    let mut pipeline = Pipeline::new(&repo, engine.as_ref(), &paths, materializer);

    info!(
        repo = %repo.repo_path().display(),
        driver = source.driver_name(),
        engine = engine.name(),
        threshold = config.mining.threshold,
        "starting mining run"
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(format!("Mining merge commits ({} driver)...", source.driver_name()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let started_at = Utc::now();
    let result = pipeline.run_with_progress(source, |p| {
        spinner.set_message(format!(
            "{} merges, {} recorded (last {})",
            p.merge_commits,
            p.accepted_scenarios,
            style::commit(&p.merge.to_string()),
        ));
    });
    spinner.finish_and_clear();
    let stats = result.context("mining run failed")?;

    let summary = RunSummary {
        driver: source.driver_name().to_string(),
        started_at,
        finished_at: Utc::now(),
        threshold: config.mining.threshold,
        engine: engine.name().to_string(),
        stats: stats.clone(),
    };
    let root = pipeline.materializer().layout().root().to_path_buf();
    summary.write_to(&root).context("failed to write run summary")?;

    println!("{}", style::success("Mining complete!"));
    println!("{}", stats_table(&stats));
    println!("  Output : {}", root.display());
    println!("  Ledger : {}", config.ledger_path().display());
    if stats.skipped_commits > 0 {
        println!(
            "{}",
            style::warn(&format!("{} commit(s) skipped; see the log", stats.skipped_commits))
        );
    }
    if stats.accepted_scenarios == 0 {
        println!("{}", style::dim("No scenario met the threshold."));
    }
    Ok(())
}

/// Refuse to replay a ledger that this run would delete or write into.
fn check_replay_source(config: &MinerConfig, ledger: &Path) -> Result<()> {
    let source = ledger
        .canonicalize()
        .with_context(|| format!("ledger not found: {}", ledger.display()))?;

    if let Ok(target) = config.ledger_path().canonicalize() {
        if target == source {
            anyhow::bail!(
                "cannot replay {} into itself; pass a different --ledger or --output",
                ledger.display()
            );
        }
    }
    if config.output.clean {
        if let Ok(root) = config.output.root.canonicalize() {
            if source.starts_with(&root) {
                anyhow::bail!(
                    "{} lies under the output root, which is cleared before the run; \
                     move it or pass --keep-existing",
                    ledger.display()
                );
            }
        }
    }
    Ok(())
}

fn stats_table(stats: &RunStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Metric", "Count"]);

    let rows: [(&str, u64); 6] = [
        ("Merge commits", stats.merge_commits as u64),
        ("Conflicted scenarios", stats.conflicted_scenarios as u64),
        ("Recorded scenarios", stats.accepted_scenarios as u64),
        ("Recorded files", stats.accepted_files as u64),
        ("Conflict blocks", stats.conflict_blocks),
        ("Skipped commits", stats.skipped_commits as u64),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table
}
