use anyhow::{anyhow, Error as AnyError};
use clap::{Args, Parser, Subcommand};
use geo::geometry::Coord;
use routeprof::Crs;
use std::{path::PathBuf, str::FromStr};

/// Elevation profiles and 3D traces of road routes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub raster: RasterArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RasterArgs {
    /// Directory of NASADEM/SRTM height (.hgt) tiles.
    #[arg(short, long, required_unless_present = "grid", conflicts_with = "grid")]
    pub tile_dir: Option<PathBuf>,

    /// Memory-map height tiles instead of reading them into memory.
    #[arg(long, default_value_t = false)]
    pub memmap: bool,

    /// ESRI ASCII grid (.asc) elevation raster.
    #[arg(short, long)]
    pub grid: Option<PathBuf>,

    /// CRS of the ASCII grid.
    #[arg(long, default_value = "EPSG:3857")]
    pub grid_crs: Crs,
}

#[derive(Debug, Clone, Args)]
pub struct RoutesArgs {
    /// GeoJSON FeatureCollection of route LineStrings.
    #[arg(short, long)]
    pub routes: PathBuf,

    /// CRS of the routes, when the file does not name one.
    #[arg(long, default_value = "EPSG:4326")]
    pub route_crs: Crs,

    /// Property holding the route identifier.
    #[arg(long)]
    pub id_field: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a 3D trace of every route to a GeoJSON file.
    Batch(Batch),

    /// Build the elevation profile of one route.
    Profile(ProfileCmd),
}

#[derive(Debug, Clone, Args)]
pub struct Batch {
    #[command(flatten)]
    pub routes: RoutesArgs,

    /// Maximum vertex spacing, in meters (units of the route CRS when
    /// it is projected). 0 keeps the original vertices.
    #[arg(short, long, default_value_t = 0.0)]
    pub interval: f64,

    /// Stop after this many routes have failed.
    #[arg(long)]
    pub max_failures: Option<usize>,

    /// Output GeoJSON file.
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct ProfileCmd {
    #[command(flatten)]
    pub routes: RoutesArgs,

    /// Identifier of the route to profile.
    #[arg(long, required_unless_present = "at", conflicts_with = "at")]
    pub route: Option<String>,

    /// Profile the route nearest to "x,y" (in route CRS units).
    #[arg(long)]
    pub at: Option<XY>,

    /// Distance between samples, in meters (units of the route CRS
    /// when it is projected).
    #[arg(short, long, default_value_t = 10.0)]
    pub step: f64,

    /// Spline densification factor. 0 disables densification.
    #[arg(long, default_value_t = routeprof::DEFAULT_SPLINE_MULTIPLIER)]
    pub spline: usize,

    /// Smoothing window length (odd). 0 disables smoothing.
    #[arg(long, default_value_t = routeprof::DEFAULT_SMOOTHING_WINDOW)]
    pub window: usize,

    /// Smoothing polynomial order.
    #[arg(long, default_value_t = routeprof::DEFAULT_SMOOTHING_ORDER)]
    pub order: usize,

    #[command(subcommand)]
    pub output: Output,
}

#[derive(Clone, Debug, Copy)]
pub struct XY(pub Coord<f64>);

impl FromStr for XY {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (x_str, y_str) = s.split_once(',').ok_or_else(|| anyhow!("not a valid x,y"))?;
        let x = f64::from_str(x_str.trim())?;
        let y = f64::from_str(y_str.trim())?;
        Ok(Self(Coord { x, y }))
    }
}

#[derive(Debug, Subcommand, Clone, Copy)]
pub enum Output {
    /// Print distance, elevation and grade to stdout.
    Csv,

    /// Print the profile as JSON to stdout.
    Json,

    /// Plot to terminal.
    Plot,
}
