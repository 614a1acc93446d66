//! Point elevation lookup across CRSs.

use crate::{
    crs::{Crs, TransformCache},
    raster::RasterSource,
    ProfileError,
};
use geo::geometry::Coord;

/// Returns the raster elevation at `coord`, given in `coord_crs`.
///
/// The coordinate is reprojected into the raster's CRS through
/// `transforms` only when the two CRSs differ. `Ok(None)` is no-data.
pub fn sample<R>(
    coord: Coord<f64>,
    coord_crs: &Crs,
    raster: &R,
    transforms: &TransformCache,
) -> Result<Option<f64>, ProfileError>
where
    R: RasterSource + ?Sized,
{
    let raster_coord = transforms.transform(coord, coord_crs, raster.crs())?;
    raster.query_elevation(raster_coord)
}
