//! Geolocation cubes (`.nav`).
//!
//! A geocube carries a line-oriented ASCII label followed by two `(NL, NS)`
//! planes of pixel longitudes and latitudes. Off-target pixels are stored
//! as the reserved digital value [`NAV_SENTINEL`] and surface as NaN.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};

use crate::cube::decode_values;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::label::LabelMetadata;
use crate::time::TimeInfo;

/// Reserved digital value marking off-target pixels.
pub const NAV_SENTINEL: f64 = -99999.0;

/// An opened geolocation cube.
#[derive(Debug, Clone)]
pub struct NavFile {
    path: PathBuf,
    /// Parsed flat-label metadata.
    pub meta: LabelMetadata,
    /// Pixel longitudes (degrees), `(NL, NS)`.
    pub longitude: Array2<f64>,
    /// Pixel latitudes (degrees), `(NL, NS)`.
    pub latitude: Array2<f64>,
}

impl NavFile {
    /// Open a geocube and decode both planes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<NavFile> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let meta = LabelMetadata::from_flat_text(&bytes)?;
        if meta.bands() != 2 {
            return Err(Error::InvalidFormat("geocube must carry exactly two planes"));
        }

        let geometry = Geometry::resolve(&meta)?;
        let values = decode_values(&bytes, &geometry, Some(NAV_SENTINEL))?;
        let longitude = values.index_axis(Axis(0), 0).to_owned();
        let latitude = values.index_axis(Axis(0), 1).to_owned();
        log::debug!(
            "opened geocube {}: {} lines, {} samples, flyby {:?}",
            path.display(),
            meta.lines(),
            meta.samples(),
            meta.flyby
        );

        Ok(NavFile {
            path: path.to_path_buf(),
            meta,
            longitude,
            latitude,
        })
    }

    /// Path this geocube was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Plane shape `(NL, NS)`.
    pub fn shape(&self) -> (usize, usize) {
        self.longitude.dim()
    }

    /// Flyby number, when the label carries a kernel reference.
    pub fn flyby(&self) -> Option<u32> {
        self.meta.flyby
    }

    /// Acquisition time resolved from the label's start/stop span.
    pub fn time(&self) -> Result<TimeInfo> {
        TimeInfo::from_span(&self.meta.start_time, &self.meta.stop_time)
    }
}
