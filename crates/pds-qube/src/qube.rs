//! File-level access to spectral cube products.
//!
//! [`QubeFile::open`] reads the whole file once, checks for the `^QUBE`
//! (or `^HISTORY`) data pointer in the label head, and parses the embedded
//! label eagerly so malformed products fail before any payload work. The
//! payload itself is decoded on first access and cached.

use std::cell::OnceCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ndarray::{ArrayView1, ArrayView2};

use crate::cube::Cube;
use crate::error::{Error, Result};
use crate::label::LabelMetadata;
use crate::pvl::LabelTree;
use crate::time::TimeInfo;

/// Bytes of the file head searched for the data pointer.
const SNIFF_BYTES: usize = 512;

/// An opened cube product.
#[derive(Debug)]
pub struct QubeFile {
    path: PathBuf,
    bytes: Vec<u8>,
    meta: LabelMetadata,
    cube: OnceCell<Cube>,
}

impl QubeFile {
    /// Open a cube product with an embedded label (`.cub`/`.qub`).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<QubeFile> {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let meta = parse_label(&bytes)?;
        log::debug!(
            "opened {}: {} bands, {} lines, {} samples",
            path.display(),
            meta.bands(),
            meta.lines(),
            meta.samples()
        );

        Ok(QubeFile {
            path: path.to_path_buf(),
            bytes,
            meta,
            cube: OnceCell::new(),
        })
    }

    /// Open a product whose label and payload live in separate files (the
    /// `.LBL` + `.QUB` convention). The label's data pointer indexes
    /// records of the payload file.
    pub fn open_split<P, Q>(label_path: P, data_path: Q) -> Result<QubeFile>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let label = read_file(label_path.as_ref())?;
        let meta = parse_label(&label)?;
        let data_path = data_path.as_ref();
        let bytes = read_file(data_path)?;
        log::debug!(
            "opened {} (split label): {} bands, {} lines, {} samples",
            data_path.display(),
            meta.bands(),
            meta.lines(),
            meta.samples()
        );

        Ok(QubeFile {
            path: data_path.to_path_buf(),
            bytes,
            meta,
            cube: OnceCell::new(),
        })
    }

    /// Path this product was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed label metadata.
    pub fn meta(&self) -> &LabelMetadata {
        &self.meta
    }

    /// Normalized image id of this product's file name.
    pub fn image_id(&self) -> String {
        image_id(&self.path)
    }

    /// Acquisition time resolved from the label's start/stop span.
    pub fn time(&self) -> Result<TimeInfo> {
        TimeInfo::from_span(&self.meta.start_time, &self.meta.stop_time)
    }

    /// The decoded cube, materialized on first call.
    pub fn cube(&self) -> Result<&Cube> {
        if let Some(cube) = self.cube.get() {
            return Ok(cube);
        }
        let decoded = Cube::decode(&self.bytes, &self.meta)?;
        Ok(self.cube.get_or_init(|| decoded))
    }

    /// Index of the band nearest to an original band number.
    pub fn band_index(&self, band: i64) -> Result<usize> {
        self.cube()?.band_index(band)
    }

    /// Index of the band nearest to a center wavelength (microns).
    pub fn wavelength_index(&self, wavelength: f64) -> Result<usize> {
        self.cube()?.wavelength_index(wavelength)
    }

    /// The `(NL, NS)` image plane of one band.
    pub fn image(&self, band_index: usize) -> Result<ArrayView2<'_, f64>> {
        self.cube()?.image(band_index)
    }

    /// The spectrum at one pixel (1-based sample/line coordinates).
    pub fn spectrum(&self, sample: usize, line: usize) -> Result<ArrayView1<'_, f64>> {
        self.cube()?.spectrum(sample, line)
    }
}

/// Normalize a product file name to its bare image id.
///
/// Lowercases the file name, then strips the `cm_` prefix, the `_ir`/`_vis`
/// channel tags, the known product extensions, and every remaining `c`/`v`
/// channel letter, in that order.
pub fn image_id(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_lowercase()
        .replace("cm_", "")
        .replace("_ir", "")
        .replace("_vis", "")
        .replace(".cub", "")
        .replace(".qub", "")
        .replace(".nav", "")
        .replace(".lbl", "")
        .replace('c', "")
        .replace('v', "")
}

/// Read a whole product file, mapping an absent file to its own error.
fn read_file(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(Error::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Sniff the data pointer and parse a structured label.
fn parse_label(bytes: &[u8]) -> Result<LabelMetadata> {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    if !contains(head, b"^QUBE") && !contains(head, b"^HISTORY") {
        return Err(Error::InvalidFormat("no ^QUBE pointer in label head"));
    }
    let (tree, _) = LabelTree::parse(bytes)?;
    LabelMetadata::from_pvl(&tree)
}

/// Substring search over raw label bytes.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LABEL: &str = "\
RECORD_BYTES = 512\r\n\
^QUBE = 2\r\n\
OBJECT = QUBE\r\n\
  AXIS_NAME = (SAMPLE,BAND,LINE)\r\n\
  CORE_ITEMS = (2,3,2)\r\n\
  CORE_ITEM_BYTES = 2\r\n\
  CORE_ITEM_TYPE = SUN_INTEGER\r\n\
  START_TIME = 2012-045T00:00:00.000000Z\r\n\
  STOP_TIME = 2012-045T02:00:00.000000Z\r\n\
  GROUP = BAND_BIN\r\n\
    BAND_BIN_CENTER = (0.35,0.36,0.37)\r\n\
    BAND_BIN_ORIGINAL_BAND = (1,2,3)\r\n\
  END_GROUP = BAND_BIN\r\n\
END_OBJECT = QUBE\r\n\
END\r\n";

    fn write_product() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let mut bytes = LABEL.as_bytes().to_vec();
        bytes.resize(512, b' ');
        for n in 0..12i16 {
            bytes.extend_from_slice(&n.to_be_bytes());
        }
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn open_parses_label_eagerly() {
        let file = write_product();
        let qube = QubeFile::open(file.path()).unwrap();
        assert_eq!(qube.meta().samples(), 2);
        assert_eq!(qube.meta().lines(), 2);
        assert_eq!(qube.meta().bands(), 3);
    }

    #[test]
    fn cube_is_decoded_once_and_cached() {
        let file = write_product();
        let qube = QubeFile::open(file.path()).unwrap();
        let first = qube.cube().unwrap();
        let second = qube.cube().unwrap();
        assert!(std::ptr::eq(first, second));
        // SAMPLE fastest, LINE slowest: stream index (l*NB + b)*NS + s.
        assert_eq!(first.values[[1, 0, 1]], 3.0);
    }

    #[test]
    fn lookups_and_views_delegate() {
        let file = write_product();
        let qube = QubeFile::open(file.path()).unwrap();
        assert_eq!(qube.band_index(2).unwrap(), 1);
        assert_eq!(qube.wavelength_index(0.368).unwrap(), 2);
        assert_eq!(qube.image(0).unwrap().dim(), (2, 2));
        assert_eq!(qube.spectrum(1, 1).unwrap().len(), 3);
    }

    #[test]
    fn time_resolves_midpoint() {
        let file = write_product();
        let qube = QubeFile::open(file.path()).unwrap();
        let time = qube.time().unwrap();
        assert_eq!(time.year, 2012);
        assert_eq!(time.day_of_year, 45);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        match QubeFile::open("/no/such/product.cub") {
            Err(Error::FileNotFound(path)) => {
                assert!(path.ends_with("product.cub"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn file_without_pointer_is_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"RECORD_BYTES = 512\r\nEND\r\n").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            QubeFile::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn truncated_payload_fails_on_cube_access() {
        let mut file = NamedTempFile::new().unwrap();
        let mut bytes = LABEL.as_bytes().to_vec();
        bytes.resize(512 + 6, b' ');
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let qube = QubeFile::open(file.path()).unwrap();
        assert!(matches!(qube.cube(), Err(Error::Bounds { .. })));
    }

    #[test]
    fn split_label_and_payload_files() {
        let label = LABEL.replace("^QUBE = 2", "^HISTORY = 2");
        let mut label_file = NamedTempFile::new().unwrap();
        label_file.write_all(label.as_bytes()).unwrap();
        label_file.flush().unwrap();

        let mut data_file = NamedTempFile::new().unwrap();
        let mut bytes = vec![b' '; 512];
        for n in 0..12i16 {
            bytes.extend_from_slice(&n.to_be_bytes());
        }
        data_file.write_all(&bytes).unwrap();
        data_file.flush().unwrap();

        let qube = QubeFile::open_split(label_file.path(), data_file.path()).unwrap();
        let cube = qube.cube().unwrap();
        assert_eq!(cube.shape(), (3, 2, 2));
        assert_eq!(cube.values[[1, 0, 1]], 3.0);
    }

    #[test]
    fn image_id_normalization() {
        assert_eq!(image_id(Path::new("CM_1549557792_1_ir.cub")), "1549557792_1");
        assert_eq!(
            image_id(Path::new("/data/cassini/CM_1549557792_1_vis.qub")),
            "1549557792_1"
        );
        assert_eq!(image_id(Path::new("V1549557792_1.NAV")), "1549557792_1");
        assert_eq!(image_id(Path::new("1549557792_1.lbl")), "1549557792_1");
    }
}
