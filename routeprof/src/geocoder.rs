use crate::{crs::Crs, geometry::LineGeometry, ProfileError};
use geo::geometry::Coord;
use std::fmt;

/// Reference to a route known to a [`Geocoder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteRef {
    /// Route identifier.
    pub id: String,

    /// Display name, when the geocoder has one.
    pub name: Option<String>,
}

impl RouteRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl fmt::Display for RouteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Linear-referencing capability over a route network.
pub trait Geocoder {
    /// Returns the geometry of `route`, or `None` if it is unknown.
    fn forward(&self, route: &RouteRef) -> Result<Option<LineGeometry>, ProfileError>;

    /// Returns the route nearest to `coord` (given in `crs`) and the
    /// distance along it, or `None` if no route is near.
    fn inverse(&self, coord: Coord<f64>, crs: &Crs)
        -> Result<Option<(RouteRef, f64)>, ProfileError>;
}
