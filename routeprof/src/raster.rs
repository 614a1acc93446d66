//! Queryable elevation rasters.

use crate::{crs::Crs, ProfileError};
use geo::geometry::Coord;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// A read-only elevation model queried by point.
pub trait RasterSource {
    /// CRS of the raster's coordinates.
    fn crs(&self) -> &Crs;

    /// Returns the elevation at `coord` (given in [`Self::crs`]).
    ///
    /// `Ok(None)` means there is no value there: outside the extent or
    /// a no-data cell. `Err(RasterUnavailable)` means the raster could
    /// not be read at all.
    fn query_elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, ProfileError>;
}

impl<T: RasterSource + ?Sized> RasterSource for &T {
    fn crs(&self) -> &Crs {
        (**self).crs()
    }

    fn query_elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, ProfileError> {
        (**self).query_elevation(coord)
    }
}

/// An in-memory, north-up grid with square cells.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRaster {
    crs: Crs,

    /// Outer corner of the north-west cell.
    origin: Coord<f64>,

    /// Cell width and height, in CRS units.
    cell_size: f64,

    width: usize,

    height: usize,

    /// Row-major values, northernmost row first.
    values: Vec<f64>,

    /// Value marking cells without data.
    no_data: Option<f64>,
}

impl GridRaster {
    pub fn new(
        crs: Crs,
        origin: Coord<f64>,
        cell_size: f64,
        width: usize,
        values: Vec<f64>,
        no_data: Option<f64>,
    ) -> Result<Self, ProfileError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ProfileError::InvalidParameter(format!(
                "cell size must be positive, got {cell_size}"
            )));
        }
        if width == 0 || values.len() % width != 0 {
            return Err(ProfileError::InvalidParameter(format!(
                "{} values do not fill rows of width {width}",
                values.len()
            )));
        }
        let height = values.len() / width;
        Ok(Self {
            crs,
            origin,
            cell_size,
            width,
            height,
            values,
            no_data,
        })
    }

    /// Returns a grid where every cell holds `value`.
    pub fn constant(
        crs: Crs,
        origin: Coord<f64>,
        cell_size: f64,
        (width, height): (usize, usize),
        value: f64,
    ) -> Result<Self, ProfileError> {
        Self::new(
            crs,
            origin,
            cell_size,
            width,
            vec![value; width * height],
            None,
        )
    }

    /// Reads an ESRI ASCII grid (`.asc`) file.
    pub fn open<P: AsRef<Path>>(path: P, crs: Crs) -> Result<Self, ProfileError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            ProfileError::RasterUnavailable(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_ascii_grid(BufReader::new(file), crs)
    }

    /// Parses ESRI ASCII grid text.
    ///
    /// The header holds `ncols`, `nrows`, `xllcorner|xllcenter`,
    /// `yllcorner|yllcenter`, `cellsize` and an optional
    /// `nodata_value`, followed by `nrows × ncols` values, north row
    /// first.
    pub fn from_ascii_grid<R: BufRead>(rdr: R, crs: Crs) -> Result<Self, ProfileError> {
        let bad = |msg: String| ProfileError::RasterUnavailable(format!("ascii grid: {msg}"));

        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut centered = false;
        let mut cell_size = None;
        let mut no_data = None;
        let mut values = Vec::new();

        for line in rdr.lines() {
            let line = line.map_err(|e| bad(e.to_string()))?;
            let mut tokens = line.split_whitespace().peekable();
            let Some(first) = tokens.peek().copied() else {
                continue;
            };
            if first.starts_with(|c: char| c.is_ascii_alphabetic()) {
                let key = first.to_ascii_lowercase();
                tokens.next();
                let value = tokens
                    .next()
                    .ok_or_else(|| bad(format!("missing value for {key}")))?;
                let number: f64 = value
                    .parse()
                    .map_err(|_| bad(format!("invalid value {value:?} for {key}")))?;
                match key.as_str() {
                    "ncols" | "nrows" => {
                        let count = parse_count(number)
                            .ok_or_else(|| bad(format!("invalid {key} {number}")))?;
                        if key == "ncols" {
                            ncols = Some(count);
                        } else {
                            nrows = Some(count);
                        }
                    }
                    "xllcorner" => xll = Some(number),
                    "yllcorner" => yll = Some(number),
                    "xllcenter" => {
                        xll = Some(number);
                        centered = true;
                    }
                    "yllcenter" => {
                        yll = Some(number);
                        centered = true;
                    }
                    "cellsize" => cell_size = Some(number),
                    "nodata_value" => no_data = Some(number),
                    _ => return Err(bad(format!("unknown header {key}"))),
                }
            } else {
                for token in tokens {
                    values.push(
                        token
                            .parse::<f64>()
                            .map_err(|_| bad(format!("invalid sample {token:?}")))?,
                    );
                }
            }
        }

        let ncols = ncols.ok_or_else(|| bad("missing ncols".into()))?;
        let nrows = nrows.ok_or_else(|| bad("missing nrows".into()))?;
        let cell_size = cell_size.ok_or_else(|| bad("missing cellsize".into()))?;
        let (mut x0, mut y0) = (
            xll.ok_or_else(|| bad("missing xllcorner".into()))?,
            yll.ok_or_else(|| bad("missing yllcorner".into()))?,
        );
        if centered {
            x0 -= cell_size / 2.0;
            y0 -= cell_size / 2.0;
        }
        if values.len() != ncols * nrows {
            return Err(bad(format!(
                "expected {} samples, found {}",
                ncols * nrows,
                values.len()
            )));
        }

        #[allow(clippy::cast_precision_loss)]
        let origin = Coord {
            x: x0,
            y: y0 + nrows as f64 * cell_size,
        };
        Self::new(crs, origin, cell_size, ncols, values, no_data)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn cell_index(&self, Coord { x, y }: Coord<f64>) -> Option<usize> {
        let col = ((x - self.origin.x) / self.cell_size).floor();
        let row = ((self.origin.y - y) / self.cell_size).floor();
        let inside = col >= 0.0
            && row >= 0.0
            && col < self.width as f64
            && row < self.height as f64;
        inside.then(|| row as usize * self.width + col as usize)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(number: f64) -> Option<usize> {
    (number >= 1.0 && number.fract() == 0.0).then_some(number as usize)
}

impl RasterSource for GridRaster {
    fn crs(&self) -> &Crs {
        &self.crs
    }

    fn query_elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, ProfileError> {
        Ok(self
            .cell_index(coord)
            .map(|idx| self.values[idx])
            .filter(|value| !value.is_nan() && Some(*value) != self.no_data))
    }
}
