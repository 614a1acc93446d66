//! Coordinate reference systems and cached transforms between them.

use crate::ProfileError;
use dashmap::DashMap;
use geo::geometry::Coord;
use log::debug;
use proj::Proj;
use std::{
    fmt,
    sync::{Arc, Mutex},
};

/// An authority-qualified CRS identifier such as `EPSG:4326`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crs(String);

impl Crs {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_uppercase())
    }

    /// Geographic WGS 84 (degrees, x = longitude).
    pub fn wgs84() -> Self {
        Self::new("EPSG:4326")
    }

    /// Spherical web mercator (meters).
    pub fn web_mercator() -> Self {
        Self::new("EPSG:3857")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether coordinates are longitude/latitude degrees.
    ///
    /// Lines in a geographic CRS are measured on the sphere, in meters.
    pub fn is_geographic(&self) -> bool {
        matches!(
            self.as_str(),
            "EPSG:4326" | "EPSG:4269" | "EPSG:4617" | "EPSG:4258" | "EPSG:4283" | "OGC:CRS84"
        )
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Crs {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ProfileError::InvalidParameter("empty CRS identifier".into()));
        }
        Ok(Self::new(s))
    }
}

/// A coordinate transform between one fixed pair of CRSs.
pub trait CoordTransform: Send + Sync {
    fn transform(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProfileError>;
}

/// Builds transforms for CRS pairs.
pub trait TransformProvider: Send + Sync {
    fn create(&self, from: &Crs, to: &Crs) -> Result<Arc<dyn CoordTransform>, ProfileError>;
}

/// Lazily built, reusable transforms keyed by `(from, to)`.
///
/// A transform is created on first use of a pair and then shared for
/// the rest of the cache's life. Identical CRSs never reach the
/// provider.
pub struct TransformCache {
    provider: Box<dyn TransformProvider>,

    /// Transforms which have been built on demand.
    transforms: DashMap<(Crs, Crs), Arc<dyn CoordTransform>>,
}

impl TransformCache {
    pub fn new<P: TransformProvider + 'static>(provider: P) -> Self {
        Self {
            provider: Box::new(provider),
            transforms: DashMap::new(),
        }
    }

    /// Returns the transform for `from → to`, or `None` when the
    /// CRSs are identical.
    pub fn get(
        &self,
        from: &Crs,
        to: &Crs,
    ) -> Result<Option<Arc<dyn CoordTransform>>, ProfileError> {
        if from == to {
            return Ok(None);
        }
        self.transforms
            .entry((from.clone(), to.clone()))
            .or_try_insert_with(|| {
                debug!("building transform {from} -> {to}");
                self.provider.create(from, to)
            })
            .map(|r| Some(Arc::clone(r.value())))
    }

    /// Transforms `coord` from `from` to `to`, passing it through
    /// untouched when the CRSs are identical.
    pub fn transform(
        &self,
        coord: Coord<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<Coord<f64>, ProfileError> {
        match self.get(from, to)? {
            None => Ok(coord),
            Some(transform) => transform.transform(coord),
        }
    }

    /// Number of distinct transforms built so far.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(ProjTransforms)
    }
}

/// Transforms between any pair of CRSs known to PROJ's database.
///
/// Coordinates are in GIS order (x = longitude/easting) for every CRS.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjTransforms;

impl TransformProvider for ProjTransforms {
    fn create(&self, from: &Crs, to: &Crs) -> Result<Arc<dyn CoordTransform>, ProfileError> {
        let proj = Proj::new_known_crs(from.as_str(), to.as_str(), None).map_err(|e| {
            ProfileError::CrsTransform {
                from: from.clone(),
                to: to.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Arc::new(ProjTransform {
            from: from.clone(),
            to: to.clone(),
            proj: Mutex::new(proj),
        }))
    }
}

struct ProjTransform {
    from: Crs,
    to: Crs,
    proj: Mutex<Proj>,
}

impl ProjTransform {
    fn error(&self, reason: String) -> ProfileError {
        ProfileError::CrsTransform {
            from: self.from.clone(),
            to: self.to.clone(),
            reason,
        }
    }
}

impl CoordTransform for ProjTransform {
    fn transform(&self, Coord { x, y }: Coord<f64>) -> Result<Coord<f64>, ProfileError> {
        let proj = self
            .proj
            .lock()
            .map_err(|_| self.error("transform lock poisoned".into()))?;
        let (tx, ty) = proj
            .convert((x, y))
            .map_err(|e| self.error(format!("({x}, {y}): {e}")))?;
        if tx.is_finite() && ty.is_finite() {
            Ok(Coord { x: tx, y: ty })
        } else {
            Err(self.error(format!("({x}, {y}) is outside the projection's domain")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Coord, Crs, ProfileError, TransformCache};
    use approx::assert_relative_eq;

    const MONTREAL: Coord<f64> = Coord {
        x: -73.567_256,
        y: 45.501_689,
    };

    #[test]
    fn test_crs_normalized() {
        assert_eq!(Crs::new(" epsg:4326 "), Crs::wgs84());
        assert_eq!(Crs::web_mercator().to_string(), "EPSG:3857");
        assert!("  ".parse::<Crs>().is_err());
        assert!(Crs::wgs84().is_geographic());
        assert!(!Crs::web_mercator().is_geographic());
        assert!(!Crs::new("EPSG:32198").is_geographic());
    }

    #[test]
    fn test_mercator_roundtrip() {
        let cache = TransformCache::default();
        let projected = cache
            .transform(MONTREAL, &Crs::wgs84(), &Crs::web_mercator())
            .unwrap();
        assert_relative_eq!(projected.x, -8_189_469.477, max_relative = 1e-9);
        assert_relative_eq!(projected.y, 5_700_850.986, max_relative = 1e-9);
        let back = cache
            .transform(projected, &Crs::web_mercator(), &Crs::wgs84())
            .unwrap();
        assert_relative_eq!(back.x, MONTREAL.x, epsilon = 1e-8);
        assert_relative_eq!(back.y, MONTREAL.y, epsilon = 1e-8);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_provincial_lambert_roundtrip() {
        // NAD83 / Quebec Lambert.
        let lambert = Crs::new("EPSG:32198");
        let cache = TransformCache::default();
        let projected = cache.transform(MONTREAL, &Crs::wgs84(), &lambert).unwrap();
        // Meters, south-west of the projection origin at 44°N 68.5°W.
        assert!(projected.x < -300_000.0 && projected.x > -500_000.0);
        assert!(projected.y > 100_000.0 && projected.y < 300_000.0);
        let back = cache.transform(projected, &lambert, &Crs::wgs84()).unwrap();
        assert_relative_eq!(back.x, MONTREAL.x, epsilon = 1e-7);
        assert_relative_eq!(back.y, MONTREAL.y, epsilon = 1e-7);
    }

    #[test]
    fn test_transform_is_cached() {
        let cache = TransformCache::default();
        for _ in 0..3 {
            cache
                .get(&Crs::wgs84(), &Crs::web_mercator())
                .unwrap()
                .unwrap();
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_identity_and_unknown() {
        let cache = TransformCache::default();
        assert!(cache.get(&Crs::wgs84(), &Crs::wgs84()).unwrap().is_none());
        assert!(cache.is_empty());
        assert!(matches!(
            cache.get(&Crs::new("EPSG:999999"), &Crs::wgs84()),
            Err(ProfileError::CrsTransform { .. })
        ));
        assert!(matches!(
            cache.transform(
                Coord { x: 0.0, y: 91.0 },
                &Crs::wgs84(),
                &Crs::web_mercator()
            ),
            Err(ProfileError::CrsTransform { .. })
        ));
    }
}
