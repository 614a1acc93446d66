//! NASADEM/SRTM elevation (`.hgt`) file format.
//!
//! A tile covers one degree of latitude and longitude and is stored as
//! big-endian `i16` samples, row by row from north to south. Samples
//! equal to [`VOID`] carry no elevation. Neighboring tiles share their
//! edge rows and columns, so a tile's samples are centered on its
//! integer corners.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;

pub use crate::error::NasademError;
use byteorder::{BigEndian as BE, ByteOrder};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{fs::File, io::Read, mem::size_of, path::Path};

/// Sample value marking a data void.
pub const VOID: i16 = i16::MIN;

/// Sample spacing of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 1 arcsecond, 3601 × 3601 samples.
    OneArcsec,

    /// 3 arcseconds, 1201 × 1201 samples.
    ThreeArcsec,
}

impl Resolution {
    pub fn from_arcsec(arcsec: u8) -> Option<Self> {
        match arcsec {
            1 => Some(Self::OneArcsec),
            3 => Some(Self::ThreeArcsec),
            _ => None,
        }
    }

    pub fn arcsec(self) -> u8 {
        match self {
            Self::OneArcsec => 1,
            Self::ThreeArcsec => 3,
        }
    }

    /// Samples along each edge of a tile.
    pub fn side(self) -> usize {
        3600 / usize::from(self.arcsec()) + 1
    }

    /// Samples per degree.
    fn per_degree(self) -> f64 {
        3600.0 / f64::from(self.arcsec())
    }

    fn file_len(self) -> u64 {
        let side = self.side() as u64;
        side * side * size_of::<i16>() as u64
    }

    fn from_file_len(len: u64) -> Option<Self> {
        [Self::OneArcsec, Self::ThreeArcsec]
            .into_iter()
            .find(|res| res.file_len() == len)
    }
}

pub struct Tile {
    /// Integer corner the tile is named after, which is also the
    /// center of its SW sample.
    sw_corner: Coord<i16>,

    resolution: Resolution,

    samples: Samples,
}

enum Samples {
    Decoded(Box<[i16]>),
    Mapped(Mmap),
}

impl Samples {
    fn at(&self, index: usize) -> i16 {
        match self {
            Self::Decoded(samples) => samples[index],
            Self::Mapped(bytes) => {
                let offset = index * size_of::<i16>();
                BE::read_i16(&bytes[offset..])
            }
        }
    }
}

impl Tile {
    /// Reads the whole tile at `path` into memory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NasademError> {
        let path = path.as_ref();
        let (sw_corner, resolution) = inspect(path)?;
        let mut raw = Vec::new();
        File::open(path)?.read_to_end(&mut raw)?;
        let mut samples = vec![0_i16; raw.len() / size_of::<i16>()];
        BE::read_i16_into(&raw, &mut samples);
        Ok(Self {
            sw_corner,
            resolution,
            samples: Samples::Decoded(samples.into_boxed_slice()),
        })
    }

    /// Maps the tile at `path` and decodes samples as they are read.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, NasademError> {
        let path = path.as_ref();
        let (sw_corner, resolution) = inspect(path)?;
        let file = File::open(path)?;
        // SAFETY: tiles are read-only inputs; truncating a file while
        // it is mapped is outside our contract.
        let bytes = unsafe { Mmap::map(&file)? };
        Ok(Self {
            sw_corner,
            resolution,
            samples: Samples::Mapped(bytes),
        })
    }

    /// Builds a tile from samples in file order (north row first).
    ///
    /// `arcsec` must be 1 or 3 and `samples` must fill the tile.
    pub fn from_samples(
        sw_corner: Coord<i16>,
        arcsec: u8,
        samples: Vec<i16>,
    ) -> Result<Self, NasademError> {
        let dimension_err = |expected| NasademError::Dimensions {
            resolution: arcsec,
            expected,
            actual: samples.len(),
        };
        let resolution = Resolution::from_arcsec(arcsec).ok_or_else(|| dimension_err(0))?;
        let expected = resolution.side() * resolution.side();
        if samples.len() != expected {
            return Err(dimension_err(expected));
        }
        Ok(Self {
            sw_corner,
            resolution,
            samples: Samples::Decoded(samples.into_boxed_slice()),
        })
    }

    /// Number of samples in the tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.resolution.side() * self.resolution.side()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn sw_corner(&self) -> Coord<i16> {
        self.sw_corner
    }

    /// Elevation of the sample nearest to `coord`, in meters.
    ///
    /// `None` when `coord` is outside the tile or the sample is void.
    pub fn get(&self, coord: Coord<f64>) -> Option<i16> {
        let (col, row) = self.nearest(coord)?;
        let sample = self.sample_at(col, row);
        (sample != VOID).then_some(sample)
    }

    /// `(column, row)` of the sample nearest to `coord`, both counted
    /// from the SW corner.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn nearest(&self, coord: Coord<f64>) -> Option<(usize, usize)> {
        let per_degree = self.resolution.per_degree();
        let col = ((coord.x - f64::from(self.sw_corner.x)) * per_degree + 0.5).floor();
        let row = ((coord.y - f64::from(self.sw_corner.y)) * per_degree + 0.5).floor();
        let side = self.resolution.side() as f64;
        let inside = (0.0..side).contains(&col) && (0.0..side).contains(&row);
        inside.then_some((col as usize, row as usize))
    }

    /// Sample in column `col`, `row` rows north of the south edge.
    fn sample_at(&self, col: usize, row: usize) -> i16 {
        let side = self.resolution.side();
        self.samples.at((side - 1 - row) * side + col)
    }
}

/// Corner and resolution of the tile file at `path`, from its name and
/// length.
fn inspect(path: &Path) -> Result<(Coord<i16>, Resolution), NasademError> {
    let sw_corner = parse_hgt_name(path)?;
    let len = path.metadata()?.len();
    let resolution =
        Resolution::from_file_len(len).ok_or_else(|| NasademError::HgtLen(len, path.to_owned()))?;
    Ok((sw_corner, resolution))
}

/// Parses a tile name such as `N44W072.hgt` into its SW corner.
fn parse_hgt_name(path: &Path) -> Result<Coord<i16>, NasademError> {
    let invalid = || NasademError::HgtName(path.to_owned());
    let stem = path
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|stem| stem.len() == 7 && stem.is_ascii())
        .ok_or_else(invalid)?;
    let (lat, lon) = stem.split_at(3);
    let signed = |hemisphere: &str, positive: char, negative: char, degrees: &str| {
        let sign = match hemisphere.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some(c) if c == positive => 1,
            Some(c) if c == negative => -1,
            _ => return None,
        };
        degrees
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| degrees.parse::<i16>().ok())
            .flatten()
            .map(|value| sign * value)
    };
    let y = signed(&lat[..1], 'N', 'S', &lat[1..]).ok_or_else(invalid)?;
    let x = signed(&lon[..1], 'E', 'W', &lon[1..]).ok_or_else(invalid)?;
    Ok(Coord { x, y })
}
