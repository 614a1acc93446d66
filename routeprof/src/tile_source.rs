//! Directories of HGT tiles as a raster source.

use crate::{crs::Crs, raster::RasterSource, ProfileError};
use dashmap::DashMap;
use geo::geometry::Coord;
use log::debug;
use nasadem::{NasademError, Tile};
use std::{ffi::OsStr, io::ErrorKind, path::PathBuf, sync::Arc};

/// A directory of `.hgt` tiles seen as one `EPSG:4326` raster.
pub struct TileSource {
    tile_dir: PathBuf,

    tile_mode: TileMode,

    /// Tiles keyed by SW corner, opened on first lookup. `None`
    /// remembers a tile which is not on disk.
    tiles: DashMap<Coord<i16>, Option<Arc<Tile>>>,

    crs: Crs,
}

impl TileSource {
    /// Fails with [`ProfileError::Path`] unless `tile_dir` holds at
    /// least one `.hgt` file.
    pub fn new(tile_dir: PathBuf, tile_mode: TileMode) -> Result<Self, ProfileError> {
        let mut entries = std::fs::read_dir(&tile_dir)?;
        let has_tiles = entries.try_fold(false, |found, entry| {
            let path = entry?.path();
            let is_hgt = path
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("hgt"));
            Ok::<_, std::io::Error>(found || is_hgt)
        })?;
        if !has_tiles {
            return Err(ProfileError::Path(tile_dir));
        }
        Ok(Self {
            tile_dir,
            tile_mode,
            tiles: DashMap::new(),
            crs: Crs::wgs84(),
        })
    }

    /// Returns the tile containing `coord`, if one exists on disk.
    ///
    /// Tiles are read from disk the first time they are needed.
    pub fn get(&self, coord: Coord<f64>) -> Result<Option<Arc<Tile>>, ProfileError> {
        let sw_corner = sw_corner(coord);
        self.tiles
            .entry(sw_corner)
            .or_try_insert_with(|| match self.load_tile(sw_corner) {
                Ok(tile) => Ok(Some(Arc::new(tile))),
                Err(NasademError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    debug!("no tile for {sw_corner:?}");
                    Ok(None)
                }
                Err(e) => Err(ProfileError::RasterUnavailable(format!(
                    "{}: {e}",
                    file_name(sw_corner)
                ))),
            })
            .map(|r| r.value().clone())
    }
}

impl RasterSource for TileSource {
    fn crs(&self) -> &Crs {
        &self.crs
    }

    fn query_elevation(&self, coord: Coord<f64>) -> Result<Option<f64>, ProfileError> {
        Ok(self
            .get(coord)?
            .and_then(|tile| tile.get(coord))
            .map(f64::from))
    }
}

impl TileSource {
    fn load_tile(&self, sw_corner: Coord<i16>) -> Result<Tile, NasademError> {
        let name = file_name(sw_corner);
        let upper = self.tile_dir.join(&name);
        let path = if upper.exists() {
            upper
        } else {
            self.tile_dir.join(name.to_lowercase())
        };
        debug!("opening {path:?} ({:?})", self.tile_mode);
        match self.tile_mode {
            TileMode::InMem => Tile::load(path),
            TileMode::MemMap => Tile::memmap(path),
        }
    }
}

/// How tiles are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    /// Read the whole tile into memory.
    InMem,

    /// Map the tile file and decode samples on access.
    MemMap,
}

/// Integer SW corner of the 1° tile containing `coord`.
#[allow(clippy::cast_possible_truncation)]
fn sw_corner(coord: Coord<f64>) -> Coord<i16> {
    Coord {
        x: coord.x.floor() as i16,
        y: coord.y.floor() as i16,
    }
}

/// HGT file name of the tile with SW corner `corner`, e.g. `N45W074.hgt`.
fn file_name(corner: Coord<i16>) -> String {
    let ns = if corner.y < 0 { 'S' } else { 'N' };
    let ew = if corner.x < 0 { 'W' } else { 'E' };
    format!(
        "{ns}{:02}{ew}{:03}.hgt",
        corner.y.unsigned_abs(),
        corner.x.unsigned_abs()
    )
}
