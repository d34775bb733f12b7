//! Label readers: from a label source to a typed [`LabelMetadata`] record.
//!
//! Two dialects exist in the corpus. Cube products (`.cub`/`.qub`) carry a
//! structured PVL label that [`LabelMetadata::from_pvl`] walks; geocube
//! products (`.nav`) carry a flat line-oriented label that
//! [`LabelMetadata::from_flat_text`] scans with exact byte accounting. Both
//! strategies produce the same schema, so everything downstream (geometry,
//! decoding, time resolution) is dialect-agnostic.

use log::debug;

use crate::error::{Error, Result};
use crate::pvl::{LabelTree, LineIter};
use crate::time::RawTime;
use crate::value::Value;

/// One of the three cube axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisName {
    Sample,
    Line,
    Band,
}

impl AxisName {
    /// Parse an `AXIS_NAME` element.
    pub fn parse(text: &str) -> Option<AxisName> {
        match text {
            "SAMPLE" => Some(AxisName::Sample),
            "LINE" => Some(AxisName::Line),
            "BAND" => Some(AxisName::Band),
            _ => None,
        }
    }
}

impl std::fmt::Display for AxisName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AxisName::Sample => "SAMPLE",
            AxisName::Line => "LINE",
            AxisName::Band => "BAND",
        };
        write!(f, "{name}")
    }
}

/// Numeric family of a core item, before size/endianness are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    SignedInt,
    UnsignedInt,
    IeeeReal,
}

/// On-disk byte order of core items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Map a `CORE_ITEM_TYPE` string onto `(type, byte order)`.
///
/// This is an enumerated lookup over the spellings observed in shipped
/// products, not a general rule; unknown spellings are rejected rather
/// than defaulted so bad geometry can never be guessed into existence.
fn item_type_table(text: &str) -> Option<(ItemType, ByteOrder)> {
    use ByteOrder::{BigEndian, LittleEndian};
    use ItemType::{IeeeReal, SignedInt, UnsignedInt};

    match text {
        "SUN_INTEGER" | "MSB_INTEGER" => Some((SignedInt, BigEndian)),
        "SUN_UNSIGNED_INTEGER" | "MSB_UNSIGNED_INTEGER" => Some((UnsignedInt, BigEndian)),
        "SUN_REAL" | "IEEE_REAL" => Some((IeeeReal, BigEndian)),
        "PC_INTEGER" | "LSB_INTEGER" | "VAX_INTEGER" => Some((SignedInt, LittleEndian)),
        "PC_UNSIGNED_INTEGER" | "LSB_UNSIGNED_INTEGER" => Some((UnsignedInt, LittleEndian)),
        "PC_REAL" | "VAX_REAL" => Some((IeeeReal, LittleEndian)),
        _ => None,
    }
}

/// Typed metadata extracted from a cube label. Built once per file, never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMetadata {
    /// On-disk axis order, fastest-varying axis first.
    pub axis_order: [AxisName; 3],
    /// Core item count per axis, aligned with `axis_order`.
    pub core_items: [usize; 3],
    /// Trailing suffix (padding) item count per axis, aligned with
    /// `axis_order`.
    pub suffix_items: [usize; 3],
    /// Numeric family of a core item.
    pub item_type: ItemType,
    /// Bytes per core item (2 or 4).
    pub item_bytes: u32,
    /// On-disk byte order, derived from the item type spelling.
    pub byte_order: ByteOrder,
    /// Byte offset of the first core item in the file.
    pub data_offset_bytes: usize,
    /// Physical record size; zero for flat labels, which address the
    /// payload by consumed label bytes instead of record index.
    pub record_bytes: usize,
    /// Digital-to-physical conversion: `physical = digital * multiplier + base`.
    pub multiplier: f64,
    /// Digital-to-physical conversion offset.
    pub base: f64,
    /// Acquisition start, in the label's native representation.
    pub start_time: RawTime,
    /// Acquisition stop, in the label's native representation.
    pub stop_time: RawTime,
    /// Band-center wavelengths in microns, one per band (may be empty for
    /// geocube labels, which have no band bin).
    pub wavelengths: Vec<f64>,
    /// Original acquisition band numbers, one per band.
    pub band_numbers: Vec<i64>,
    /// Observation target body, when the label names one.
    pub target: Option<String>,
    /// Instrument id, when the label names one.
    pub instrument_id: Option<String>,
    /// Spacecraft / host name, when the label names one.
    pub instrument_host: Option<String>,
    /// Flyby number recovered from a kernel filename token (flat labels).
    pub flyby: Option<u32>,
}

impl LabelMetadata {
    /// Extent of the given axis. An axis absent from `axis_order` (only
    /// possible for hand-built metadata, parsing validates the permutation)
    /// has extent zero.
    pub fn dim(&self, axis: AxisName) -> usize {
        self.axis_order
            .iter()
            .position(|&a| a == axis)
            .map_or(0, |slot| self.core_items[slot])
    }

    /// Suffix item count of the given axis.
    pub fn suffix(&self, axis: AxisName) -> usize {
        self.axis_order
            .iter()
            .position(|&a| a == axis)
            .map_or(0, |slot| self.suffix_items[slot])
    }

    /// Number of samples (NS).
    pub fn samples(&self) -> usize {
        self.dim(AxisName::Sample)
    }

    /// Number of lines (NL).
    pub fn lines(&self) -> usize {
        self.dim(AxisName::Line)
    }

    /// Number of bands (NB).
    pub fn bands(&self) -> usize {
        self.dim(AxisName::Band)
    }

    // ── Structured strategy ──

    /// Build metadata from a structured PVL label tree.
    pub fn from_pvl(tree: &LabelTree) -> Result<LabelMetadata> {
        let record_bytes = require_usize(tree.get("RECORD_BYTES"), "RECORD_BYTES")?;

        // Both pointer spellings occur: VIMS cubes point at the QUBE
        // object, VIR team cubes at the trailing HISTORY object.
        let pointer = tree
            .get("^QUBE")
            .or_else(|| tree.get("^HISTORY"))
            .ok_or(Error::MissingKey("^QUBE"))?;
        let record_index = pointer
            .as_i64()
            .filter(|&n| n >= 1)
            .ok_or(Error::InvalidValue("^QUBE"))? as usize;
        let data_offset_bytes = (record_index - 1) * record_bytes;

        let qube = tree.group("QUBE").ok_or(Error::MissingKey("QUBE"))?;

        let axis_order = parse_axis_order(
            qube.get("AXIS_NAME").ok_or(Error::MissingKey("AXIS_NAME"))?,
        )?;
        let core_items = parse_axis_counts(
            qube.get("CORE_ITEMS")
                .ok_or(Error::MissingKey("CORE_ITEMS"))?,
            "CORE_ITEMS",
        )?;
        let suffix_items = match qube.get("SUFFIX_ITEMS") {
            Some(v) => parse_axis_counts(v, "SUFFIX_ITEMS")?,
            None => [0, 0, 0],
        };

        let item_bytes = require_usize(qube.get("CORE_ITEM_BYTES"), "CORE_ITEM_BYTES")? as u32;
        if item_bytes != 2 && item_bytes != 4 {
            return Err(Error::InvalidValue("CORE_ITEM_BYTES"));
        }

        let type_text = qube
            .get("CORE_ITEM_TYPE")
            .and_then(Value::as_str)
            .ok_or(Error::MissingKey("CORE_ITEM_TYPE"))?;
        let (item_type, byte_order) =
            item_type_table(type_text).ok_or(Error::InvalidValue("CORE_ITEM_TYPE"))?;

        let multiplier = optional_f64(qube.get("CORE_MULTIPLIER"), 1.0);
        let base = optional_f64(qube.get("CORE_BASE"), 0.0);

        // VIMS keeps times inside the QUBE object, VIR at the top level.
        let start_time = require_time(
            qube.get("START_TIME").or_else(|| tree.get("START_TIME")),
            "START_TIME",
        )?;
        let stop_time = require_time(
            qube.get("STOP_TIME").or_else(|| tree.get("STOP_TIME")),
            "STOP_TIME",
        )?;

        let band_bin = qube.group("BAND_BIN").ok_or(Error::MissingKey("BAND_BIN"))?;
        let wavelengths = band_bin
            .get("BAND_BIN_CENTER")
            .ok_or(Error::MissingKey("BAND_BIN_CENTER"))?
            .as_sequence()
            .iter()
            .map(|v| v.as_f64().ok_or(Error::InvalidValue("BAND_BIN_CENTER")))
            .collect::<Result<Vec<_>>>()?;
        let band_numbers = band_bin
            .get("BAND_BIN_ORIGINAL_BAND")
            .ok_or(Error::MissingKey("BAND_BIN_ORIGINAL_BAND"))?
            .as_sequence()
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or(Error::InvalidValue("BAND_BIN_ORIGINAL_BAND"))
            })
            .collect::<Result<Vec<_>>>()?;

        let meta = LabelMetadata {
            axis_order,
            core_items,
            suffix_items,
            item_type,
            item_bytes,
            byte_order,
            data_offset_bytes,
            record_bytes,
            multiplier,
            base,
            start_time,
            stop_time,
            wavelengths,
            band_numbers,
            target: optional_string(qube.get("TARGET_NAME").or_else(|| tree.get("TARGET_NAME"))),
            instrument_id: optional_string(
                qube.get("INSTRUMENT_ID").or_else(|| tree.get("INSTRUMENT_ID")),
            ),
            instrument_host: optional_string(
                qube.get("INSTRUMENT_HOST_NAME")
                    .or_else(|| tree.get("INSTRUMENT_HOST_NAME")),
            ),
            flyby: None,
        };
        debug!(
            "structured label: {}x{}x{} (SxLxB), {:?} {:?} {} bytes/item",
            meta.samples(),
            meta.lines(),
            meta.bands(),
            meta.item_type,
            meta.byte_order,
            meta.item_bytes,
        );
        Ok(meta)
    }

    // ── Line-oriented strategy ──

    /// Build metadata by scanning a flat, line-oriented label.
    ///
    /// Consumed bytes are accounted per line so the payload offset can be
    /// computed; the label ends at a bare `END` or `FIN` sentinel line.
    /// Two pad bytes follow the sentinel in shipped geocube products, so
    /// the data offset is `consumed + 2`.
    pub fn from_flat_text(bytes: &[u8]) -> Result<LabelMetadata> {
        let mut consumed = 0usize;
        let mut sentinel_seen = false;

        let mut axis_order = None;
        let mut core_items = None;
        let mut item_bytes = None;
        let mut item_type_text: Option<String> = None;
        let mut record_bytes = 0usize;
        let mut start_time = None;
        let mut stop_time = None;
        let mut flyby = None;

        for raw_line in LineIter::new(bytes) {
            consumed += raw_line.len();
            let line = decode_flat_line(raw_line);
            let trimmed = line.trim();

            if trimmed == "END" || trimmed == "FIN" {
                sentinel_seen = true;
                break;
            }

            if line.contains(".ker") {
                flyby = parse_flyby(line);
            } else if line.contains("AXIS_NAME") {
                axis_order = Some(parse_axis_order(&crate::value::parse_scalar(
                    assignment_value(line)?,
                ))?);
            } else if line.contains("CORE_ITEMS") {
                core_items = Some(parse_axis_counts(
                    &crate::value::parse_scalar(assignment_value(line)?),
                    "CORE_ITEMS",
                )?);
            } else if line.contains("CORE_ITEM_BYTES") {
                let n: u32 = assignment_value(line)?
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidValue("CORE_ITEM_BYTES"))?;
                item_bytes = Some(n);
            } else if line.contains("CORE_ITEM_TYPE") {
                item_type_text = Some(assignment_value(line)?.trim().to_string());
            } else if line.contains("START_TIME") && !is_alternate_clock(line) {
                start_time = Some(RawTime::Doy(unquote(assignment_value(line)?)));
            } else if line.contains("STOP_TIME") && !is_alternate_clock(line) {
                stop_time = Some(RawTime::Doy(unquote(assignment_value(line)?)));
            } else if line.contains("RECORD_BYTES") {
                record_bytes = assignment_value(line)?
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidValue("RECORD_BYTES"))?;
            }
        }

        if !sentinel_seen {
            return Err(Error::TruncatedLabel);
        }

        let item_bytes = item_bytes.ok_or(Error::MissingKey("CORE_ITEM_BYTES"))?;
        if item_bytes != 2 && item_bytes != 4 {
            return Err(Error::InvalidValue("CORE_ITEM_BYTES"));
        }
        let type_text = item_type_text.ok_or(Error::MissingKey("CORE_ITEM_TYPE"))?;
        let (item_type, byte_order) =
            item_type_table(&type_text).ok_or(Error::InvalidValue("CORE_ITEM_TYPE"))?;

        let meta = LabelMetadata {
            axis_order: axis_order.ok_or(Error::MissingKey("AXIS_NAME"))?,
            core_items: core_items.ok_or(Error::MissingKey("CORE_ITEMS"))?,
            suffix_items: [0, 0, 0],
            item_type,
            item_bytes,
            byte_order,
            // Two pad bytes follow the sentinel line on disk.
            data_offset_bytes: consumed + 2,
            record_bytes,
            multiplier: 1.0,
            base: 0.0,
            start_time: start_time.ok_or(Error::MissingKey("START_TIME"))?,
            stop_time: stop_time.ok_or(Error::MissingKey("STOP_TIME"))?,
            wavelengths: Vec::new(),
            band_numbers: Vec::new(),
            target: None,
            instrument_id: None,
            instrument_host: None,
            flyby,
        };
        debug!(
            "flat label: {}x{} (SxL), data at byte {}",
            meta.samples(),
            meta.lines(),
            meta.data_offset_bytes,
        );
        Ok(meta)
    }
}

// ── Shared field parsing ──

fn parse_axis_order(value: &Value) -> Result<[AxisName; 3]> {
    let items = value.as_sequence();
    if items.len() != 3 {
        return Err(Error::InvalidValue("AXIS_NAME"));
    }
    let mut axes = [AxisName::Sample; 3];
    for (slot, item) in items.iter().enumerate() {
        let text = item.as_str().ok_or(Error::InvalidValue("AXIS_NAME"))?;
        axes[slot] = AxisName::parse(text).ok_or(Error::InvalidValue("AXIS_NAME"))?;
    }
    // A permutation has no repeats.
    if axes[0] == axes[1] || axes[0] == axes[2] || axes[1] == axes[2] {
        return Err(Error::InvalidValue("AXIS_NAME"));
    }
    Ok(axes)
}

fn parse_axis_counts(value: &Value, key: &'static str) -> Result<[usize; 3]> {
    let items = value.as_sequence();
    if items.len() != 3 {
        return Err(Error::InvalidValue(key));
    }
    let mut counts = [0usize; 3];
    for (slot, item) in items.iter().enumerate() {
        let n = item.as_i64().ok_or(Error::InvalidValue(key))?;
        if n < 0 || (key == "CORE_ITEMS" && n == 0) {
            return Err(Error::InvalidValue(key));
        }
        counts[slot] = n as usize;
    }
    Ok(counts)
}

fn require_usize(value: Option<&Value>, key: &'static str) -> Result<usize> {
    value
        .ok_or(Error::MissingKey(key))?
        .as_i64()
        .filter(|&n| n >= 0)
        .map(|n| n as usize)
        .ok_or(Error::InvalidValue(key))
}

fn optional_f64(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(default)
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn require_time(value: Option<&Value>, key: &'static str) -> Result<RawTime> {
    let value = value.ok_or(Error::MissingKey(key))?;
    if let Some(t) = value.as_time() {
        return Ok(RawTime::Utc(t));
    }
    match value.as_str() {
        Some(text) => Ok(RawTime::Doy(text.to_string())),
        None => Err(Error::InvalidValue(key)),
    }
}

// ── Flat-label line helpers ──

fn decode_flat_line(raw: &[u8]) -> &str {
    let end = raw
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end]).unwrap_or("")
}

fn assignment_value(line: &str) -> Result<&str> {
    line.split_once('=')
        .map(|(_, value)| value.trim())
        .ok_or(Error::InvalidFormat("label line without `=`"))
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// Alternate-clock duplicates of the time keys carry NATIVE or
/// EARTH_RECEIVED qualifiers and must be skipped.
fn is_alternate_clock(line: &str) -> bool {
    line.contains("NATIVE") || line.contains("EARTH_RECEIVED")
}

/// The flyby number sits in a fixed slice of the kernel filename token:
/// the three digits before the `.ker` extension.
fn parse_flyby(line: &str) -> Option<u32> {
    let line = line.trim_end();
    let len = line.len();
    if len < 8 {
        return None;
    }
    line.get(len - 8..len - 5)?.parse().ok()
}
