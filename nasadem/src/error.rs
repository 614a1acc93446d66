use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NasademError {
    #[error("tile io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is not named like an HGT tile")]
    HgtName(PathBuf),

    #[error("{1} is {0} bytes long, not a 1 or 3 arcsecond tile")]
    HgtLen(u64, PathBuf),

    #[error("expected {expected} samples for a {resolution} arcsecond tile, got {actual}")]
    Dimensions {
        resolution: u8,
        expected: usize,
        actual: usize,
    },
}
