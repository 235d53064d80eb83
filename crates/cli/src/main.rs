//! landshift CLI - land-cover conversion scenarios with carbon and MSA reporting

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use landshift_algorithms::globio::{
    globio_land_cover, GlobioConfig, GlobioParams, ReclassTable, DEFAULT_SOURCE_COLUMN, DEFAULT_TARGET_COLUMN,
};
use landshift_algorithms::landscape::{edge_distance, ffqi};
use landshift_core::io::{read_geotiff, read_raster_info, write_geotiff};
use landshift_core::{ErrorKind, Raster, RasterElement};
use landshift_scenario::{ScenarioConfig, ScenarioEngine};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "landshift")]
#[command(author, version, about = "Land-cover conversion scenarios with carbon and biodiversity indicators", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario described by a JSON configuration
    Run {
        /// Scenario configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Distance from each forest pixel to the forest edge
    EdgeDistance {
        /// Input land-cover raster
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Land-cover codes counted as forest
        #[arg(short, long, value_delimiter = ',', required = true)]
        forest_codes: Vec<i32>,
    },
    /// Forest fragmentation quality index
    Ffqi {
        /// Input land-cover raster
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Land-cover codes counted as natural
        #[arg(short, long, value_delimiter = ',', required = true)]
        natural_codes: Vec<i32>,
        /// Gaussian sigma in pixels
        #[arg(short, long, default_value = "3")]
        sigma: f64,
    },
    /// Derive the GLOBIO land-cover
    Globio {
        /// Input land-cover raster
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Reclassification table (CSV)
        #[arg(short, long)]
        reclass: PathBuf,
        /// Source code column of the reclassification table
        #[arg(long, default_value = DEFAULT_SOURCE_COLUMN)]
        source_column: String,
        /// Target code column of the reclassification table
        #[arg(long, default_value = DEFAULT_TARGET_COLUMN)]
        target_column: String,
        /// Summed yield gap raster
        #[arg(long)]
        yieldgap: PathBuf,
        /// Potential natural vegetation raster
        #[arg(long)]
        potential_veg: PathBuf,
        /// Pasture fraction raster
        #[arg(long)]
        pasture: PathBuf,
        /// Also write the forest fragmentation index here
        #[arg(long)]
        ffqi_output: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> =
        read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn code_set(codes: &[i32]) -> BTreeSet<i32> {
    codes.iter().copied().collect()
}

/// Exit code of a failed command: 1 configuration, 2 input, 3 evaluation
fn exit_code(err: &anyhow::Error) -> u8 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<landshift_core::Error>())
        .map(landshift_core::Error::kind);
    match kind {
        Some(ErrorKind::Config) | None => 1,
        Some(ErrorKind::Input) => 2,
        Some(ErrorKind::Evaluation) => 3,
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_scenario(config_path: &Path) -> Result<()> {
    let config = ScenarioConfig::from_file(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let pb = spinner("Loading inputs...");
    let mut engine = ScenarioEngine::from_config(&config)?;
    pb.finish_and_clear();

    let bar = ProgressBar::new(config.total_steps.max(0) as u64 + 1);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }

    let start = Instant::now();
    let outcome = engine.run_with(|report| {
        bar.inc(1);
        bar.set_message(format!("step {} ({} pixels)", report.step, report.converted));
    });
    bar.finish_and_clear();
    let summary = outcome?;
    engine.finish()?;

    println!(
        "Scenario '{}' finished: {} steps, {} pixels converted",
        config.scenario.name(),
        summary.steps,
        summary.converted
    );
    println!("  Columns: {}", summary.columns.join(", "));
    done("Report", &config.output_csv_path, start.elapsed());
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let header = read_raster_info(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let raster: Raster<f64> = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Data type: {}", header.data_type);
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if !header.projection.is_empty() {
        println!("Projection: {}", header.projection);
    }
    if let Some(nodata) = header.nodata {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config } => run_scenario(&config)?,

        Commands::Info { input } => show_info(&input)?,

        Commands::EdgeDistance {
            input,
            output,
            forest_codes,
        } => {
            let lulc: Raster<i32> = read_raster(&input)?;
            let start = Instant::now();
            let result =
                edge_distance(&lulc, &code_set(&forest_codes)).context("Failed to compute edge distance")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Edge distance", &output, elapsed);
        }

        Commands::Ffqi {
            input,
            output,
            natural_codes,
            sigma,
        } => {
            let lulc: Raster<i32> = read_raster(&input)?;
            let start = Instant::now();
            let result = ffqi(&lulc, &code_set(&natural_codes), sigma).context("Failed to compute FFQI")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("FFQI", &output, elapsed);
        }

        Commands::Globio {
            input,
            output,
            reclass,
            source_column,
            target_column,
            yieldgap,
            potential_veg,
            pasture,
            ffqi_output,
        } => {
            let lulc: Raster<i32> = read_raster(&input)?;
            let yieldgap: Raster<f32> = read_raster(&yieldgap)?;
            let potential_veg: Raster<f32> = read_raster(&potential_veg)?;
            let pasture: Raster<f32> = read_raster(&pasture)?;
            let config = GlobioConfig {
                reclass: ReclassTable::load(&reclass, &source_column, &target_column)
                    .with_context(|| format!("Failed to load {}", reclass.display()))?,
                params: GlobioParams::default(),
            };

            let start = Instant::now();
            let result = globio_land_cover(&lulc, &yieldgap, &potential_veg, &pasture, &config)
                .context("Failed to derive GLOBIO land-cover")?;
            let elapsed = start.elapsed();
            write_result(&result.lulc, &output)?;
            if let Some(path) = ffqi_output {
                write_result(&result.ffqi, &path)?;
            }
            done("GLOBIO land-cover", &output, elapsed);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = setup_logging(cli.verbose) {
        eprintln!("Error: {:#}", err);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let config: anyhow::Error = landshift_core::Error::Config("bad".into()).into();
        assert_eq!(exit_code(&config), 1);

        let missing: anyhow::Error = landshift_core::Error::NotFound {
            path: PathBuf::from("lulc.tif"),
        }
        .into();
        assert_eq!(exit_code(&missing.context("Failed to load run.json")), 2);

        let exhausted = landshift_core::Error::Exhausted {
            step: 3,
            policy: "edge_expansion",
        }
        .at_step(3);
        assert_eq!(exit_code(&exhausted.into()), 3);

        assert_eq!(exit_code(&anyhow::anyhow!("unrelated")), 1);
    }

    #[test]
    fn test_code_lists_parse() {
        let cli = Cli::parse_from(["landshift", "edge-distance", "in.tif", "out.tif", "--forest-codes", "1,2,3"]);
        match cli.command {
            Commands::EdgeDistance { forest_codes, .. } => assert_eq!(forest_codes, vec![1, 2, 3]),
            _ => panic!("expected edge-distance"),
        }
    }
}
