use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
#[cfg(not(feature = "tracing"))]
use log::LevelFilter;
use map_merge::io::{MergeConfig, MergeReport, PlacementConfig};
use map_merge::map_image::{load_map_image, save_map_image};
use map_merge::{placements_from_origins, MergingPipeline, OccupancyGrid, Pose};

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

/// Merge occupancy grid map images into one map.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON merge configuration
    config: PathBuf,

    /// Merged map image path (overrides the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); ignored with `tracing`, use RUST_LOG
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

type BoxError = Box<dyn std::error::Error>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("merge failed: {err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8) {
    // verbosity comes from RUST_LOG under tracing
    let _ = LogTracer::init();
    map_merge::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = map_merge::core::init_with_level(level);
}

fn run(cli: &Cli) -> Result<(), BoxError> {
    let cfg = MergeConfig::load_json(&cli.config)?;
    let base = cli.config.parent().unwrap_or_else(|| Path::new(""));

    let mut report = MergeReport::new(&cfg, &cli.config);
    let result = merge(&cfg, base, cli.output.clone());
    match &result {
        Ok((poses, merged, output)) => report.set_merged(poses.clone(), merged, output),
        Err(err) => report.set_error(err),
    }

    if let Some(report_path) = cfg.report_path() {
        let report_path = resolve(base, report_path);
        report.write_json(&report_path)?;
        println!("wrote report JSON to {}", report_path.display());
    }

    result.map(|_| ())
}

fn merge(
    cfg: &MergeConfig,
    base: &Path,
    output: Option<PathBuf>,
) -> Result<(Vec<Pose>, OccupancyGrid, PathBuf), BoxError> {
    if cfg.maps.is_empty() {
        return Err("config lists no maps".into());
    }

    let grids = cfg
        .maps
        .iter()
        .map(|m| load_map_image(resolve(base, &m.image_path), &m.params))
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&OccupancyGrid> = grids.iter().collect();

    let poses = match &cfg.placement {
        PlacementConfig::KnownOrigins => placements_from_origins(&refs)?,
        PlacementConfig::Poses { poses } => poses.clone(),
    };

    let mut merger = MergingPipeline::without_estimator();
    merger.feed(refs.iter().copied());
    merger.set_transforms(&poses)?;
    let merged = merger
        .compose_grids()
        .ok_or("merged map would not fit in a grid")?;

    let output = output.unwrap_or_else(|| resolve(base, cfg.output_path()));
    save_map_image(&merged, &output)?;
    log::info!(
        "merged {} maps into {}x{} cells at {:.3} m/cell",
        grids.len(),
        merged.width(),
        merged.height(),
        merged.resolution()
    );
    println!("wrote merged map to {}", output.display());

    Ok((merger.transforms(), merged, output))
}

fn resolve(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
