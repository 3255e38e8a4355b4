use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ms_app::{
    AppError, AppResult, SkipReason, StudyOptions, StudyProgressEvent, StudyRequest, StudyStage,
    UnitOutcome, cache_service, config_service, inventory, report, study_service,
};
use ms_core::{CycleKind, UnitKey};
use ms_project::StudyConfig;

#[derive(Parser)]
#[command(name = "mgstudy")]
#[command(about = "Multigrid convergence study driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the study configuration
    Validate {
        /// Path to the study YAML file (built-in study when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the work units the study would process
    Units {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the study, reusing cached results where they suffice
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Purge the cache and recompute every unit
        #[arg(long, conflicts_with = "plot_only")]
        force: bool,
        /// Report cached results only, never invoke the solver
        #[arg(long)]
        plot_only: bool,
        /// Write plot-ready report data as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List cache entries and whether the current study would reuse them
    Cache {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Delete cached results
    Purge {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Only remove the entry of this mesh (requires --cycle)
        #[arg(long, requires = "cycle")]
        mesh: Option<String>,
        /// Cycle of the entry to remove (V or W)
        #[arg(long, requires = "mesh")]
        cycle: Option<CycleKind>,
    },
    /// Write the built-in study configuration as YAML
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => cmd_validate(config.as_deref()),
        Commands::Units { config } => cmd_units(config.as_deref()),
        Commands::Run {
            config,
            force,
            plot_only,
            report,
        } => cmd_run(
            config.as_deref(),
            StudyOptions { force, plot_only },
            report.as_deref(),
        ),
        Commands::Cache { config } => cmd_cache(config.as_deref()),
        Commands::Purge {
            config,
            mesh,
            cycle,
        } => cmd_purge(config.as_deref(), mesh.zip(cycle)),
        Commands::InitConfig { path } => cmd_init_config(&path),
    }
}

fn load(config_path: Option<&Path>) -> AppResult<StudyConfig> {
    match config_path {
        Some(path) => config_service::load_config(path),
        None => Ok(config_service::default_config()),
    }
}

fn cmd_validate(config_path: Option<&Path>) -> AppResult<()> {
    if let Some(path) = config_path {
        println!("Validating study: {}", path.display());
    }
    let config = load(config_path)?;
    ms_project::validate_config(&config)?;
    println!("✓ Configuration is valid");
    println!(
        "  {} meshes, cycles: {}",
        config.meshes.len(),
        config
            .cycles
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn cmd_units(config_path: Option<&Path>) -> AppResult<()> {
    let config = load(config_path)?;
    let inventory = inventory::scan_inventory(&config)?;
    let units = inventory::enumerate_units(&inventory.meshes, &config.cycles);

    if units.is_empty() {
        println!("No work units in {}", config.mesh_folder.display());
    } else {
        println!("Work units ({}):", units.len());
        for unit in &units {
            println!(
                "  {:<28} {}-cycle, refs={}  ({})",
                unit.key().as_str(),
                unit.cycle,
                unit.target_refinement(),
                unit.mesh.path.display()
            );
        }
    }

    if !inventory.unconfigured.is_empty() {
        println!("\nNot configured (skipped):");
        for path in &inventory.unconfigured {
            println!("  {}", path.display());
        }
    }
    if !inventory.missing.is_empty() {
        println!("\nConfigured but missing:");
        for name in &inventory.missing {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn cmd_run(
    config_path: Option<&Path>,
    options: StudyOptions,
    report_path: Option<&Path>,
) -> AppResult<()> {
    let config = load(config_path)?;
    println!(
        "Running convergence study ({} meshes, mesh folder {})",
        config.meshes.len(),
        config.mesh_folder.display()
    );
    if options.force {
        println!("  Forced re-run: cache will be purged");
    }
    if options.plot_only {
        println!("  Plot only: solver will not be invoked");
    }

    let request = StudyRequest {
        config: &config,
        options,
    };

    let mut last_emit = Instant::now();
    let mut last_stage: Option<StudyStage> = None;
    let outcome = study_service::ensure_study_with_progress(
        &request,
        Some(&mut |event: StudyProgressEvent| {
            let emit_now =
                last_stage.as_ref() != Some(&event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage.clone());
                last_emit = Instant::now();
            }
        }),
    );
    clear_progress_line();

    let response = match outcome {
        Ok(response) => response,
        Err(err @ AppError::EmptyStudyResult { .. }) => {
            println!("✗ No results to plot");
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    if let Some(purge) = &response.purge {
        println!(
            "Purged {} cache files ({} failed)",
            purge.removed.len(),
            purge.failed.len()
        );
    }

    println!("\nUnits:");
    for unit in &response.units {
        let status = match &unit.outcome {
            UnitOutcome::CacheHit { max_refinement } => {
                format!("cached (refs={})", max_refinement)
            }
            UnitOutcome::Computed {
                max_refinement,
                saved,
            } => {
                if *saved {
                    format!("computed (refs={})", max_refinement)
                } else {
                    format!("computed (refs={}, not cached)", max_refinement)
                }
            }
            UnitOutcome::Skipped(SkipReason::PlotOnly) => "skipped (no cached result)".to_string(),
            UnitOutcome::Skipped(SkipReason::Failed(failure)) => format!("failed: {}", failure),
        };
        let mark = if unit.outcome.is_accepted() { "✓" } else { "✗" };
        println!("  {} {:<28} {}", mark, unit.unit.as_str(), status);
    }

    print_timing_summary(&response.timing);

    println!("\nResults:");
    for summary in report::summarize(&response.result) {
        let mut line = format!(
            "  [{}] {:<22} rows={}",
            summary.cycle, summary.mesh, summary.rows
        );
        if let Some(dofs) = summary.finest_dofs {
            line.push_str(&format!("  DOFs={}", dofs));
        }
        if let Some(rho) = summary.finest_convergence {
            line.push_str(&format!("  |lambda|={:.4}", rho));
        }
        if let Some(its) = summary.finest_gmres {
            line.push_str(&format!("  GMRES={:.2}", its));
        }
        println!("{}", line);
    }

    let study_report = report::build_report(&response.result);
    for panel in study_report.panels.iter().filter(|p| !p.has_data) {
        println!("  [{}] no data", panel.cycle);
    }

    if let Some(path) = report_path {
        report::write_report_json(&study_report, path)?;
        println!("\n✓ Report data written to {}", path.display());
    }

    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &StudyProgressEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} [{}/{}] {}",
        spinner[spin_idx],
        (event.index + 1).min(event.total),
        event.total,
        event.stage.label()
    );
    if let Some(unit) = &event.unit {
        line.push_str(&format!("  {}", unit));
    }
    if let Some(msg) = &event.message {
        line.push_str(&format!("  {}", msg));
    }
    line.push_str(&format!("  elapsed={:.1}s", event.elapsed_wall_s));
    print!("{}", line);
    let _ = io::stdout().flush();
}

fn print_timing_summary(timing: &ms_app::StudyTimingSummary) {
    let total = timing.total_time_s.max(1.0e-12);
    let solve_pct = 100.0 * timing.solve_time_s / total;

    println!("\nTiming summary:");
    if timing.purge_time_s > 0.0 {
        println!("  Purge:   {:.3}s", timing.purge_time_s);
    }
    println!("  Cache:   {:.3}s", timing.cache_time_s);
    println!("  Solve:   {:.3}s ({:.1}%)", timing.solve_time_s, solve_pct);
    println!("  Save:    {:.3}s", timing.save_time_s);
    println!("  Total:   {:.3}s", timing.total_time_s);
    println!(
        "  Units: {} cached, {} computed, {} skipped, {} failed",
        timing.cache_hits, timing.computed, timing.skipped, timing.failed
    );
}

fn cmd_cache(config_path: Option<&Path>) -> AppResult<()> {
    let config = load(config_path)?;
    let statuses = cache_service::cache_status(&config)?;

    if statuses.is_empty() {
        println!("No cached results in {}", config.output_dir.display());
        return Ok(());
    }

    println!("Cached results in {}:", config.output_dir.display());
    for status in statuses {
        let entry = &status.entry;
        let refs = entry
            .max_refinement
            .map(|r| r.to_string())
            .unwrap_or_else(|| "?".to_string());
        let verdict = match (status.target_refinement, status.sufficient) {
            (None, _) => "not in study".to_string(),
            (Some(target), true) => format!("reusable (target {})", target),
            (Some(target), false) => format!("insufficient (target {})", target),
        };
        let mut line = format!("  {:<28} refs={:<3} {}", entry.unit_key, refs, verdict);
        if status.fingerprint_matches == Some(false) {
            line.push_str("  [solver settings changed]");
        }
        if let Some(manifest) = &entry.manifest {
            line.push_str(&format!("  ({})", manifest.timestamp));
        }
        println!("{}", line);
    }
    Ok(())
}

fn cmd_purge(config_path: Option<&Path>, unit: Option<(String, CycleKind)>) -> AppResult<()> {
    let config = load(config_path)?;

    if let Some((mesh, cycle)) = unit {
        let key = UnitKey::new(&mesh, cycle);
        cache_service::remove_entry(&config, &key)?;
        println!("✓ Removed cache entry {}", key);
        return Ok(());
    }

    let report = cache_service::purge_cache(&config)?;
    println!(
        "✓ Removed {} files from {}",
        report.removed.len(),
        config.output_dir.display()
    );
    for (path, reason) in &report.failed {
        println!("  ✗ {}: {}", path.display(), reason);
    }
    Ok(())
}

fn cmd_init_config(path: &Path) -> AppResult<()> {
    config_service::save_config(path, &config_service::default_config())?;
    println!("✓ Wrote default study configuration to {}", path.display());
    Ok(())
}
