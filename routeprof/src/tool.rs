//! Interactive profile generation: geocode a route, build its
//! profile and draw it.

use crate::{
    crs::{Crs, TransformCache},
    geocoder::{Geocoder, RouteRef},
    profile::{NoDataPolicy, Profile},
    raster::RasterSource,
    smooth::{DEFAULT_SMOOTHING_ORDER, DEFAULT_SMOOTHING_WINDOW},
    spline::DEFAULT_SPLINE_MULTIPLIER,
    ProfileError,
};
use geo::geometry::Coord;
use log::{debug, warn};

/// Something a profile can be drawn on.
pub trait DrawingSurface {
    fn draw_series(&mut self, points: &[(f64, f64)], style: &SeriesStyle);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesStyle {
    /// Series label, usually the route name.
    pub label: String,

    /// `#rrggbb`.
    pub color: String,
}

impl Default for SeriesStyle {
    fn default() -> Self {
        Self {
            label: String::new(),
            color: "#3060c0".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileOptions {
    pub step_size_m: f64,

    /// Spline multiplier, or `None` to skip densification.
    pub spline: Option<usize>,

    /// `(window, order)`, or `None` to skip smoothing.
    pub smoothing: Option<(usize, usize)>,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            step_size_m: 10.0,
            spline: Some(DEFAULT_SPLINE_MULTIPLIER),
            smoothing: Some((DEFAULT_SMOOTHING_WINDOW, DEFAULT_SMOOTHING_ORDER)),
        }
    }
}

pub struct ProfileTool<'a, R: ?Sized> {
    geocoder: &'a dyn Geocoder,
    raster: &'a R,
    transforms: &'a TransformCache,
    options: ProfileOptions,
}

impl<'a, R> ProfileTool<'a, R>
where
    R: RasterSource + ?Sized,
{
    pub fn new(geocoder: &'a dyn Geocoder, raster: &'a R, transforms: &'a TransformCache) -> Self {
        Self {
            geocoder,
            raster,
            transforms,
            options: ProfileOptions::default(),
        }
    }

    #[must_use]
    pub fn options(mut self, options: ProfileOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the display profile of `route`.
    ///
    /// No-data samples are recorded at 0 m. A densify or smooth stage
    /// which the profile is too short for is skipped with a warning.
    pub fn profile_route(&self, route: &RouteRef) -> Result<Profile, ProfileError> {
        let line = self
            .geocoder
            .forward(route)?
            .ok_or_else(|| ProfileError::Geocoder(format!("unknown route {route}")))?;

        let mut profile = Profile::builder()
            .id(route.id.clone())
            .name(route.display_name())
            .step_size(self.options.step_size_m)
            .no_data(NoDataPolicy::SubstituteZero)
            .build(&line, self.raster, self.transforms)?;
        debug!("route {route}; {} samples", profile.len());

        if let Some(multiplier) = self.options.spline {
            profile = skip_if_short(profile, "spline", |p| p.densify(multiplier))?;
        }
        if let Some((window, order)) = self.options.smoothing {
            profile = skip_if_short(profile, "smoothing", |p| p.smooth(window, order))?;
        }
        Ok(profile)
    }

    /// Builds the display profile of the route nearest to `coord`.
    pub fn profile_at(&self, coord: Coord<f64>, crs: &Crs) -> Result<Profile, ProfileError> {
        let (route, measure) = self.geocoder.inverse(coord, crs)?.ok_or_else(|| {
            ProfileError::Geocoder(format!("no route near ({}, {})", coord.x, coord.y))
        })?;
        debug!("nearest route {route} at {measure}");
        self.profile_route(&route)
    }

    pub fn draw<D: DrawingSurface + ?Sized>(&self, profile: &Profile, surface: &mut D) {
        let points: Vec<(f64, f64)> = profile.points().collect();
        let style = SeriesStyle {
            label: profile.name.clone(),
            ..Default::default()
        };
        surface.draw_series(&points, &style);
    }
}

fn skip_if_short<F>(profile: Profile, stage: &str, f: F) -> Result<Profile, ProfileError>
where
    F: FnOnce(&Profile) -> Result<Profile, ProfileError>,
{
    match f(&profile) {
        Ok(p) => Ok(p),
        Err(ProfileError::InsufficientSamples(reason)) => {
            warn!("skipping {stage} for {}: {reason}", profile.id);
            Ok(profile)
        }
        Err(e) => Err(e),
    }
}
