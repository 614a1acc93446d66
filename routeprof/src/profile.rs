use crate::{
    crs::TransformCache, geometry::LineGeometry, lookup, raster::RasterSource, ProfileError,
};
use log::debug;

/// Elevation along a route, as parallel distance/elevation series.
///
/// Distances are strictly increasing for a freshly built profile.
/// Densifying or smoothing returns a new profile rather than
/// modifying this one.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Display name (usually the route's name).
    pub name: String,

    /// Route identifier.
    pub id: String,

    /// Distance of each sample from the route start.
    pub distances_m: Vec<f64>,

    /// Elevation at each sample.
    pub elevations_m: Vec<f64>,
}

/// What to record when the raster has no value at a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoDataPolicy {
    /// Record the sample at 0 m.
    #[default]
    SubstituteZero,

    /// Fail the whole build with [`ProfileError::NoElevationData`].
    AbortOnNoData,
}

impl Profile {
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder {
            name: None,
            id: None,
            step_size_m: None,
            no_data: NoDataPolicy::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.distances_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances_m.is_empty()
    }

    /// Returns `(distance, elevation)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.distances_m
            .iter()
            .copied()
            .zip(self.elevations_m.iter().copied())
    }

    /// Returns a profile with the same name and id and new series.
    pub(crate) fn with_series(&self, distances_m: Vec<f64>, elevations_m: Vec<f64>) -> Self {
        debug_assert_eq!(distances_m.len(), elevations_m.len());
        Self {
            name: self.name.clone(),
            id: self.id.clone(),
            distances_m,
            elevations_m,
        }
    }
}

pub struct ProfileBuilder {
    name: Option<String>,

    id: Option<String>,

    /// Distance between samples (required).
    step_size_m: Option<f64>,

    /// No-data handling (defaults to substituting zero).
    no_data: NoDataPolicy,
}

impl ProfileBuilder {
    /// Display name (defaults to the id).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Route identifier (defaults to empty).
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Distance between samples (required, positive).
    #[must_use]
    pub fn step_size(mut self, meters: f64) -> Self {
        self.step_size_m = Some(meters);
        self
    }

    /// No-data handling (defaults to [`NoDataPolicy::SubstituteZero`]).
    #[must_use]
    pub fn no_data(mut self, policy: NoDataPolicy) -> Self {
        self.no_data = policy;
        self
    }

    /// Walks `line` and looks up the raster elevation at each sample.
    pub fn build<R>(
        &self,
        line: &LineGeometry,
        raster: &R,
        transforms: &TransformCache,
    ) -> Result<Profile, ProfileError>
    where
        R: RasterSource + ?Sized,
    {
        let step_size_m = self.step_size_m.ok_or(ProfileError::Builder("step_size"))?;
        let now = std::time::Instant::now();

        let samples = line.sample(step_size_m)?;
        let mut distances_m = Vec::with_capacity(samples.len());
        let mut elevations_m = Vec::with_capacity(samples.len());
        for sample in samples {
            let elevation = match lookup::sample(sample.position, line.crs(), raster, transforms)? {
                Some(elevation) => elevation,
                None => match self.no_data {
                    NoDataPolicy::SubstituteZero => 0.0,
                    NoDataPolicy::AbortOnNoData => {
                        return Err(ProfileError::NoElevationData {
                            x: sample.position.x,
                            y: sample.position.y,
                        })
                    }
                },
            };
            distances_m.push(sample.distance_m);
            elevations_m.push(elevation);
        }

        debug!(
            "profile; len: {}, exec: {:?}",
            distances_m.len(),
            now.elapsed()
        );

        let id = self.id.clone().unwrap_or_default();
        Ok(Profile {
            name: self.name.clone().unwrap_or_else(|| id.clone()),
            id,
            distances_m,
            elevations_m,
        })
    }
}
