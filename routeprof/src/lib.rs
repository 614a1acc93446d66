//! # Route elevation profiles
//!
//! `routeprof` samples road routes against elevation rasters. It
//! builds display profiles (optionally spline densified and
//! Savitzky-Golay smoothed) and generates 3D traces for whole route
//! layers.

pub mod batch;
mod crs;
mod error;
mod feedback;
mod geocoder;
mod geometry;
pub mod lookup;
mod math;
mod profile;
mod raster;
mod smooth;
mod spline;
mod tile_source;
mod tool;

pub use {
    crate::{
        batch::{
            route_id, AttrValue, BatchRunState, FeatureSink, FeatureSource, RouteFeature,
            RouteLayer, RunStatus, Trace3D, TraceGenerator,
        },
        crs::{CoordTransform, Crs, ProjTransforms, TransformCache, TransformProvider},
        error::ProfileError,
        feedback::{Feedback, LogFeedback},
        geocoder::{Geocoder, RouteRef},
        geometry::{DistanceIter, DistanceSample, LineGeometry},
        profile::{NoDataPolicy, Profile, ProfileBuilder},
        raster::{GridRaster, RasterSource},
        smooth::{DEFAULT_SMOOTHING_ORDER, DEFAULT_SMOOTHING_WINDOW},
        spline::DEFAULT_SPLINE_MULTIPLIER,
        tile_source::{TileMode, TileSource},
        tool::{DrawingSurface, ProfileOptions, ProfileTool, SeriesStyle},
    },
    geo, nasadem,
};
