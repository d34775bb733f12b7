//! Decoder for PDS QUBE spectral cube products.
//!
//! Reads Cassini/VIMS `.cub`/`.qub` cubes, Dawn/VIR team cubes, and VIMS
//! `.nav` geocubes: the embedded ASCII label is parsed into typed metadata,
//! the binary payload is decoded into a canonical `[band, line, sample]`
//! array of physical values, and acquisition times resolve to UTC.

pub mod catalog;
pub mod cube;
pub mod error;
pub mod geometry;
pub mod label;
pub mod nav;
pub mod pvl;
pub mod qube;
pub mod time;
pub mod value;

pub use cube::Cube;
pub use error::{Error, Result};
pub use geometry::Geometry;
pub use label::LabelMetadata;
pub use nav::NavFile;
pub use qube::QubeFile;
pub use time::TimeInfo;
