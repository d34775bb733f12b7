//! Core payload decoding into a canonical `[band, line, sample]` cube.

use ndarray::{s, Array3, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::geometry::{Geometry, ItemLayout};
use crate::label::LabelMetadata;

/// A decoded spectral cube in physical units, indexed `[band, line, sample]`.
#[derive(Debug, Clone)]
pub struct Cube {
    /// Physical values after the affine conversion.
    pub values: Array3<f64>,
    /// The label this cube was decoded from.
    pub meta: LabelMetadata,
}

impl Cube {
    /// Decode a cube from the full file contents.
    pub fn decode(file_bytes: &[u8], meta: &LabelMetadata) -> Result<Cube> {
        let geometry = Geometry::resolve(meta)?;
        let values = decode_values(file_bytes, &geometry, None)?;
        Ok(Cube {
            values,
            meta: meta.clone(),
        })
    }

    /// Canonical shape `(NB, NL, NS)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        let d = self.values.dim();
        (d.0, d.1, d.2)
    }

    /// Index of the band whose original band number is nearest to `band`.
    ///
    /// Fails with [`Error::OutOfRange`] when `band` lies outside the span
    /// of the label's band numbers.
    pub fn band_index(&self, band: i64) -> Result<usize> {
        let numbers: Vec<f64> = self.meta.band_numbers.iter().map(|&b| b as f64).collect();
        nearest(&numbers, band as f64, "band number")
    }

    /// Index of the band whose center wavelength is nearest to `wavelength`
    /// (microns).
    pub fn wavelength_index(&self, wavelength: f64) -> Result<usize> {
        nearest(&self.meta.wavelengths, wavelength, "wavelength")
    }

    /// The `(NL, NS)` image plane of one band.
    pub fn image(&self, band_index: usize) -> Result<ArrayView2<'_, f64>> {
        if band_index >= self.values.len_of(Axis(0)) {
            return Err(Error::OutOfRange("band index"));
        }
        Ok(self.values.index_axis(Axis(0), band_index))
    }

    /// The spectrum at one pixel, addressed with 1-based sample and line
    /// coordinates as the labels count them.
    pub fn spectrum(&self, sample: usize, line: usize) -> Result<ArrayView1<'_, f64>> {
        let (_, nl, ns) = self.shape();
        if sample < 1 || sample > ns {
            return Err(Error::OutOfRange("sample coordinate"));
        }
        if line < 1 || line > nl {
            return Err(Error::OutOfRange("line coordinate"));
        }
        Ok(self.values.slice(s![.., line - 1, sample - 1]))
    }
}

/// Index of the element of `values` nearest to `target`, rejecting targets
/// outside the closed span of `values`.
fn nearest(values: &[f64], target: f64, what: &'static str) -> Result<usize> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if values.is_empty() || target < min || target > max {
        return Err(Error::OutOfRange(what));
    }
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    Ok(best)
}

/// Decode the payload described by `geometry` into a canonical array.
///
/// When `sentinel` is given, core items whose *digital* value equals it
/// become NaN instead of going through the affine conversion.
pub(crate) fn decode_values(
    bytes: &[u8],
    geometry: &Geometry,
    sentinel: Option<f64>,
) -> Result<Array3<f64>> {
    let needed = geometry
        .payload_byte_len()
        .ok_or(Error::InvalidValue("CORE_ITEMS"))?;
    let payload = geometry
        .data_offset_bytes
        .checked_add(needed)
        .and_then(|end| bytes.get(geometry.data_offset_bytes..end))
        .ok_or_else(|| Error::Bounds {
            needed,
            available: bytes.len().saturating_sub(geometry.data_offset_bytes),
        })?;

    let item_bytes = geometry.layout.item_bytes();
    let [e0, e1, e2] = geometry.disk_extents;
    let [s0, s1, _] = geometry.disk_suffix;
    let row_stride = (e0 + s0) * item_bytes;
    let block_stride = (e1 + s1) * row_stride;

    let perm = geometry.axis_permutation;
    let mut cube = Array3::<f64>::zeros(geometry.shape);
    let mut idx = [0usize; 3];

    for i2 in 0..e2 {
        for i1 in 0..e1 {
            let row = &payload[i2 * block_stride + i1 * row_stride..][..e0 * item_bytes];
            for (i0, digital) in decode_items(row, geometry.layout).into_iter().enumerate() {
                idx[perm[0]] = i2;
                idx[perm[1]] = i1;
                idx[perm[2]] = i0;
                cube[idx] = match sentinel {
                    Some(mark) if digital == mark => f64::NAN,
                    _ => digital * geometry.multiplier + geometry.base,
                };
            }
        }
    }

    Ok(cube)
}

/// Decode one contiguous run of core items to digital values.
fn decode_items(raw: &[u8], layout: ItemLayout) -> Vec<f64> {
    match layout {
        ItemLayout::I16Be => bytemuck::pod_collect_to_vec::<u8, i16>(raw)
            .into_iter()
            .map(i16::from_be)
            .map(f64::from)
            .collect(),
        ItemLayout::I16Le => bytemuck::pod_collect_to_vec::<u8, i16>(raw)
            .into_iter()
            .map(i16::from_le)
            .map(f64::from)
            .collect(),
        ItemLayout::U16Be => bytemuck::pod_collect_to_vec::<u8, u16>(raw)
            .into_iter()
            .map(u16::from_be)
            .map(f64::from)
            .collect(),
        ItemLayout::U16Le => bytemuck::pod_collect_to_vec::<u8, u16>(raw)
            .into_iter()
            .map(u16::from_le)
            .map(f64::from)
            .collect(),
        ItemLayout::F32Be => bytemuck::pod_collect_to_vec::<u8, u32>(raw)
            .into_iter()
            .map(u32::from_be)
            .map(f32::from_bits)
            .map(f64::from)
            .collect(),
        ItemLayout::F32Le => bytemuck::pod_collect_to_vec::<u8, u32>(raw)
            .into_iter()
            .map(u32::from_le)
            .map(f32::from_bits)
            .map(f64::from)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{AxisName, ByteOrder, ItemType};
    use crate::time::RawTime;

    fn meta(axis_order: [AxisName; 3], core_items: [usize; 3]) -> LabelMetadata {
        LabelMetadata {
            axis_order,
            core_items,
            suffix_items: [0, 0, 0],
            item_type: ItemType::SignedInt,
            item_bytes: 2,
            byte_order: ByteOrder::BigEndian,
            data_offset_bytes: 0,
            record_bytes: 512,
            multiplier: 1.0,
            base: 0.0,
            start_time: RawTime::Doy(String::from("2012-045T00:00:00.000000Z")),
            stop_time: RawTime::Doy(String::from("2012-045T02:00:00.000000Z")),
            wavelengths: vec![0.35, 0.36, 0.37],
            band_numbers: vec![1, 2, 3],
            target: None,
            instrument_id: None,
            instrument_host: None,
            flyby: None,
        }
    }

    /// Big-endian i16 payload counting 0, 1, 2, ... in disk order.
    fn counting_payload(items: usize) -> Vec<u8> {
        (0..items as i16)
            .flat_map(|n| n.to_be_bytes())
            .collect()
    }

    #[test]
    fn sample_band_line_order_lands_canonically() {
        // SAMPLE fastest, LINE slowest: stream index is (l*NB + b)*NS + s.
        let m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 3, 2]);
        let cube = Cube::decode(&counting_payload(12), &m).unwrap();
        assert_eq!(cube.shape(), (3, 2, 2));
        for b in 0..3 {
            for l in 0..2 {
                for s in 0..2 {
                    let expected = ((l * 3 + b) * 2 + s) as f64;
                    assert_eq!(cube.values[[b, l, s]], expected);
                }
            }
        }
    }

    #[test]
    fn sample_line_band_order_lands_canonically() {
        // SAMPLE fastest, BAND slowest: stream index is (b*NL + l)*NS + s.
        let m = meta([AxisName::Sample, AxisName::Line, AxisName::Band], [2, 2, 3]);
        let cube = Cube::decode(&counting_payload(12), &m).unwrap();
        for b in 0..3 {
            for l in 0..2 {
                for s in 0..2 {
                    let expected = ((b * 2 + l) * 2 + s) as f64;
                    assert_eq!(cube.values[[b, l, s]], expected);
                }
            }
        }
    }

    #[test]
    fn band_sample_line_order_lands_canonically() {
        // BAND fastest, LINE slowest: stream index is (l*NS + s)*NB + b.
        let m = meta([AxisName::Band, AxisName::Sample, AxisName::Line], [3, 2, 2]);
        let cube = Cube::decode(&counting_payload(12), &m).unwrap();
        for b in 0..3 {
            for l in 0..2 {
                for s in 0..2 {
                    let expected = ((l * 2 + s) * 3 + b) as f64;
                    assert_eq!(cube.values[[b, l, s]], expected);
                }
            }
        }
    }

    #[test]
    fn suffix_items_are_skipped() {
        let mut m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 2, 2]);
        m.suffix_items = [1, 1, 0];

        // Each row carries one trailing sideplane item, each block one
        // trailing backplane row. Mark every padding item 9999.
        let mut payload = Vec::new();
        let mut next = 0i16;
        for _line in 0..2 {
            for _band in 0..2 {
                for _sample in 0..2 {
                    payload.extend_from_slice(&next.to_be_bytes());
                    next += 1;
                }
                payload.extend_from_slice(&9999i16.to_be_bytes());
            }
            for _pad in 0..3 {
                payload.extend_from_slice(&9999i16.to_be_bytes());
            }
        }

        let cube = Cube::decode(&payload, &m).unwrap();
        for b in 0..2 {
            for l in 0..2 {
                for s in 0..2 {
                    let expected = ((l * 2 + b) * 2 + s) as f64;
                    assert_eq!(cube.values[[b, l, s]], expected);
                }
            }
        }
    }

    #[test]
    fn affine_conversion_is_exact() {
        let mut m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 2, 2]);
        m.multiplier = 2.0;
        m.base = -1.0;
        let cube = Cube::decode(&counting_payload(8), &m).unwrap();
        assert_eq!(cube.values[[0, 0, 0]], -1.0);
        assert_eq!(cube.values[[0, 0, 1]], 1.0);
        assert_eq!(cube.values[[1, 1, 1]], 13.0);
    }

    #[test]
    fn data_offset_respected() {
        let mut m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 2, 2]);
        m.data_offset_bytes = 4;
        let mut bytes = vec![0xFFu8; 4];
        bytes.extend(counting_payload(8));
        let cube = Cube::decode(&bytes, &m).unwrap();
        assert_eq!(cube.values[[0, 0, 0]], 0.0);
    }

    #[test]
    fn truncated_payload_is_bounds_error() {
        let m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 2, 2]);
        let payload = counting_payload(7);
        match Cube::decode(&payload, &m) {
            Err(Error::Bounds { needed, available }) => {
                assert_eq!(needed, 16);
                assert_eq!(available, 14);
            }
            other => panic!("expected Bounds, got {other:?}"),
        }
    }

    #[test]
    fn absurd_extents_rejected_without_overflow() {
        // A declared extent near usize::MAX must surface as a typed error,
        // not wrap around the size computation and pass the bounds check.
        let m = meta(
            [AxisName::Sample, AxisName::Band, AxisName::Line],
            [usize::MAX / 2, 4, 4],
        );
        assert!(matches!(
            Cube::decode(&counting_payload(8), &m),
            Err(Error::InvalidValue("CORE_ITEMS"))
        ));
    }

    #[test]
    fn float_payload_little_endian() {
        let mut m = meta([AxisName::Sample, AxisName::Line, AxisName::Band], [2, 1, 1]);
        m.item_bytes = 4;
        m.item_type = ItemType::IeeeReal;
        m.byte_order = ByteOrder::LittleEndian;
        let mut payload = Vec::new();
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        payload.extend_from_slice(&(-2.25f32).to_le_bytes());
        let cube = Cube::decode(&payload, &m).unwrap();
        assert_eq!(cube.values[[0, 0, 0]], 1.5);
        assert_eq!(cube.values[[0, 0, 1]], -2.25);
    }

    #[test]
    fn sentinel_becomes_nan() {
        let mut m = meta([AxisName::Sample, AxisName::Line, AxisName::Band], [2, 1, 1]);
        m.item_bytes = 4;
        m.item_type = ItemType::IeeeReal;
        let mut payload = Vec::new();
        payload.extend_from_slice(&(-99999.0f32).to_be_bytes());
        payload.extend_from_slice(&0.5f32.to_be_bytes());

        let g = Geometry::resolve(&m).unwrap();
        let values = decode_values(&payload, &g, Some(-99999.0)).unwrap();
        assert!(values[[0, 0, 0]].is_nan());
        assert_eq!(values[[0, 0, 1]], 0.5);
    }

    #[test]
    fn decode_is_deterministic() {
        let m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 3, 2]);
        let payload = counting_payload(12);
        let a = Cube::decode(&payload, &m).unwrap();
        let b = Cube::decode(&payload, &m).unwrap();
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn nearest_band_and_wavelength() {
        let m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 3, 2]);
        let cube = Cube::decode(&counting_payload(12), &m).unwrap();

        assert_eq!(cube.band_index(2).unwrap(), 1);
        assert_eq!(cube.wavelength_index(0.356).unwrap(), 1);
        assert_eq!(cube.wavelength_index(0.37).unwrap(), 2);

        assert!(matches!(
            cube.band_index(99),
            Err(Error::OutOfRange("band number"))
        ));
        assert!(matches!(
            cube.wavelength_index(0.2),
            Err(Error::OutOfRange("wavelength"))
        ));
    }

    #[test]
    fn image_and_spectrum_views() {
        let m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [2, 3, 2]);
        let cube = Cube::decode(&counting_payload(12), &m).unwrap();

        let plane = cube.image(1).unwrap();
        assert_eq!(plane.dim(), (2, 2));
        assert_eq!(plane[[0, 0]], 2.0);

        let spec = cube.spectrum(2, 1).unwrap();
        assert_eq!(spec.len(), 3);
        assert_eq!(spec[0], 1.0);
        assert_eq!(spec[1], 3.0);

        assert!(cube.image(3).is_err());
        assert!(cube.spectrum(0, 1).is_err());
        assert!(cube.spectrum(1, 3).is_err());
    }
}
