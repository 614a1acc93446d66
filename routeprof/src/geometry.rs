//! Route geometries and fixed-interval walks along them.

use crate::{crs::Crs, ProfileError};
use geo::{
    geometry::{Coord, LineString, Point},
    Densify, EuclideanLength, HaversineDistance, HaversineIntermediate, HaversineLength,
};

/// An immutable 2D route line in a known CRS.
///
/// Lines in a geographic CRS are measured along great circles, in
/// meters. Other lines are measured in the plane, in CRS units.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGeometry {
    line: LineString<f64>,
    crs: Crs,
    length: f64,
}

/// A position at `distance_m` along a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub distance_m: f64,
    pub position: Coord<f64>,
}

impl LineGeometry {
    pub fn new(line: LineString<f64>, crs: Crs) -> Self {
        let length = if crs.is_geographic() {
            line.haversine_length()
        } else {
            line.euclidean_length()
        };
        Self { line, crs, length }
    }

    pub fn line(&self) -> &LineString<f64> {
        &self.line
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Total length in meters (or CRS units for a projected CRS in
    /// other units).
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn vertices(&self) -> impl ExactSizeIterator<Item = Coord<f64>> + '_ {
        self.line.0.iter().copied()
    }

    /// Returns a copy with extra vertices inserted so that no segment
    /// is longer than `max_spacing`.
    pub fn densify(&self, max_spacing: f64) -> Result<Self, ProfileError> {
        check_interval(max_spacing)?;
        let line = if self.crs.is_geographic() {
            densify_haversine(&self.line, max_spacing)
        } else {
            self.line.densify(max_spacing)
        };
        Ok(Self::new(line, self.crs.clone()))
    }

    /// Walks the line at `0, interval, 2·interval, …`.
    ///
    /// Yields exactly `floor(length / interval)` samples; the far end
    /// is only included when a step lands on it before the count is
    /// reached.
    pub fn sample(&self, interval: f64) -> Result<DistanceIter<'_>, ProfileError> {
        check_interval(interval)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let total = (self.length / interval).floor() as usize;
        Ok(DistanceIter {
            coords: &self.line.0,
            geodesic: self.crs.is_geographic(),
            interval,
            total,
            current: 0,
            segment: 0,
            segment_start_m: 0.0,
        })
    }
}

fn check_interval(interval: f64) -> Result<(), ProfileError> {
    if interval.is_finite() && interval > 0.0 {
        Ok(())
    } else {
        Err(ProfileError::InvalidParameter(format!(
            "sampling interval must be positive, got {interval}"
        )))
    }
}

/// Great-circle counterpart of [`Densify`] for lon/lat lines.
fn densify_haversine(line: &LineString<f64>, max_spacing_m: f64) -> LineString<f64> {
    let mut coords = Vec::with_capacity(line.0.len());
    for segment in line.lines() {
        let (start, end) = (Point::from(segment.start), Point::from(segment.end));
        coords.push(segment.start);
        coords.extend(
            start
                .haversine_intermediate_fill(&end, max_spacing_m, false)
                .into_iter()
                .map(|p| p.0),
        );
    }
    coords.extend(line.0.last().copied());
    LineString::new(coords)
}

/// Lazy walk along a line's vertices.
///
/// Clone it before consuming to walk the same line again.
#[derive(Debug, Clone)]
pub struct DistanceIter<'a> {
    coords: &'a [Coord<f64>],
    /// Measure and interpolate along great circles.
    geodesic: bool,
    interval: f64,
    total: usize,
    current: usize,
    /// Index of the segment's first vertex.
    segment: usize,
    /// Distance from the line start to `coords[segment]`.
    segment_start_m: f64,
}

impl<'a> DistanceIter<'a> {
    fn segment_length(&self, idx: usize) -> f64 {
        let (a, b) = (self.coords[idx], self.coords[idx + 1]);
        if self.geodesic {
            Point::from(a).haversine_distance(&Point::from(b))
        } else {
            let delta = b - a;
            delta.x.hypot(delta.y)
        }
    }

    /// Position at fraction `t` of the way from `a` to `b`.
    fn interpolate(&self, a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
        if t <= 0.0 {
            a
        } else if self.geodesic {
            Point::from(a).haversine_intermediate(&Point::from(b), t).0
        } else {
            a + (b - a) * t
        }
    }
}

impl<'a> Iterator for DistanceIter<'a> {
    type Item = DistanceSample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.total {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let distance_m = self.current as f64 * self.interval;
        self.current += 1;

        // Samples only move forward, so the segment cursor does too.
        let mut segment_len = self.segment_length(self.segment);
        while distance_m > self.segment_start_m + segment_len
            && self.segment + 2 < self.coords.len()
        {
            self.segment_start_m += segment_len;
            self.segment += 1;
            segment_len = self.segment_length(self.segment);
        }

        let a = self.coords[self.segment];
        let b = self.coords[self.segment + 1];
        let t = if segment_len > 0.0 {
            ((distance_m - self.segment_start_m) / segment_len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(DistanceSample {
            distance_m,
            position: self.interpolate(a, b, t),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.current;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for DistanceIter<'a> {}
