use crate::crs::Crs;
use nasadem::NasademError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("missing required parameter '{0}'")]
    Builder(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no elevation data at ({x}, {y})")]
    NoElevationData { x: f64, y: f64 },

    #[error("raster unavailable: {0}")]
    RasterUnavailable(String),

    #[error("no transform from {from} to {to}: {reason}")]
    CrsTransform { from: Crs, to: Crs, reason: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("insufficient samples: {0}")]
    InsufficientSamples(String),

    #[error("feature sink rejected trace: {0}")]
    Sink(String),

    #[error("geocoder: {0}")]
    Geocoder(String),

    #[error("no height files in {0}")]
    Path(PathBuf),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Nasadem(#[from] NasademError),
}
