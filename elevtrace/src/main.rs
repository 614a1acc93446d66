mod options;
mod plot;
mod progress;
mod routes;

use anyhow::{anyhow, Error as AnyError};
use clap::Parser;
use itertools::Itertools;
use log::info;
use options::{Batch, Cli, Command as CliCmd, Output, ProfileCmd, RasterArgs};
use routeprof::{
    GridRaster, Profile, ProfileOptions, ProfileTool, RasterSource, RouteRef, TileMode,
    TileSource, TraceGenerator, TransformCache,
};
use routes::{GeojsonRoutes, TraceWriter};
use serde::Serialize;
use std::io::Write;
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    env_logger::init();

    let raster = open_raster(&cli.raster)?;
    let transforms = TransformCache::default();

    match &cli.cmd {
        CliCmd::Batch(batch) => run_batch(batch, raster.as_ref(), &transforms),
        CliCmd::Profile(profile) => run_profile(profile, raster.as_ref(), &transforms),
    }
}

fn open_raster(args: &RasterArgs) -> Result<Box<dyn RasterSource>, AnyError> {
    match (&args.tile_dir, &args.grid) {
        (Some(tile_dir), _) => {
            let mode = if args.memmap {
                TileMode::MemMap
            } else {
                TileMode::InMem
            };
            Ok(Box::new(TileSource::new(tile_dir.clone(), mode)?))
        }
        (None, Some(grid)) => Ok(Box::new(GridRaster::open(grid, args.grid_crs.clone())?)),
        (None, None) => Err(anyhow!("one of --tile-dir or --grid is required")),
    }
}

fn run_batch(
    batch: &Batch,
    raster: &dyn RasterSource,
    transforms: &TransformCache,
) -> Result<(), AnyError> {
    let routes = GeojsonRoutes::open(
        &batch.routes.routes,
        &batch.routes.route_crs,
        batch.routes.id_field.as_deref(),
    )?;

    let mut generator = TraceGenerator::new(raster, transforms).interval(batch.interval);
    if let Some(id_field) = &batch.routes.id_field {
        generator = generator.id_field(id_field.clone());
    }

    let mut sink = TraceWriter::new();
    let mut feedback = progress::ProgressFeedback::new(
        progress::bar(format!("Trace {}", batch.routes.routes.display())),
        batch.max_failures,
    );
    let state = generator.run(&routes, &mut sink, &mut feedback)?;
    feedback.finish();

    info!(
        "{:?}; {} of {} routes traced, {} failed",
        state.status, state.succeeded, state.processed, state.failed
    );
    let written = sink.len();
    sink.finish(&batch.out)?;
    eprintln!("wrote {written} traces to {}", batch.out.display());
    Ok(())
}

fn run_profile(
    cmd: &ProfileCmd,
    raster: &dyn RasterSource,
    transforms: &TransformCache,
) -> Result<(), AnyError> {
    let routes = GeojsonRoutes::open(
        &cmd.routes.routes,
        &cmd.routes.route_crs,
        cmd.routes.id_field.as_deref(),
    )?;
    let options = ProfileOptions {
        step_size_m: cmd.step,
        spline: (cmd.spline > 0).then_some(cmd.spline),
        smoothing: (cmd.window > 0).then_some((cmd.window, cmd.order)),
    };
    let tool = ProfileTool::new(&routes, raster, transforms).options(options);

    let profile = match (&cmd.route, cmd.at) {
        (Some(id), _) => tool.profile_route(&RouteRef::new(id.clone()))?,
        (None, Some(at)) => tool.profile_at(at.0, routes.crs())?,
        (None, None) => return Err(anyhow!("one of --route or --at is required")),
    };

    match cmd.output {
        Output::Csv => print_csv(&profile)?,
        Output::Json => print_json(&profile)?,
        Output::Plot => tool.draw(&profile, &mut plot::TerminalPlot::default()),
    }
    Ok(())
}

/// Prints `distance,elevation,grade`, where grade is the percent
/// slope from the previous sample.
fn print_csv(profile: &Profile) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Distance,Elevation,Grade")?;
    if let Some((distance, elevation)) = profile.points().next() {
        writeln!(stdout, "{distance},{elevation},")?;
    }
    for ((d0, e0), (d1, e1)) in profile.points().tuple_windows() {
        let grade = (e1 - e0) / (d1 - d0) * 100.0;
        writeln!(stdout, "{d1},{e1},{grade:.2}")?;
    }
    Ok(())
}

fn print_json(profile: &Profile) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct JsonProfile<'a> {
        id: &'a str,
        name: &'a str,
        points: Vec<JsonEntry>,
    }

    #[derive(Serialize)]
    struct JsonEntry {
        distance: f64,
        elevation: f64,
    }

    let reshaped = JsonProfile {
        id: &profile.id,
        name: &profile.name,
        points: profile
            .points()
            .map(|(distance, elevation)| JsonEntry {
                distance,
                elevation,
            })
            .collect(),
    };
    let json = serde_json::to_string(&reshaped)?;
    println!("{json}");
    Ok(())
}
