//! Byte-layout resolution: from a [`LabelMetadata`] to a concrete decode plan.

use crate::error::{Error, Result};
use crate::label::{AxisName, ByteOrder, ItemType, LabelMetadata};

/// Concrete binary layout of one core item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLayout {
    I16Be,
    I16Le,
    U16Be,
    U16Le,
    F32Be,
    F32Le,
}

impl ItemLayout {
    /// Bytes per item for this layout.
    pub fn item_bytes(&self) -> usize {
        match self {
            ItemLayout::I16Be | ItemLayout::I16Le | ItemLayout::U16Be | ItemLayout::U16Le => 2,
            ItemLayout::F32Be | ItemLayout::F32Le => 4,
        }
    }

    /// Resolve `{item_type, item_bytes, byte_order}` to a layout.
    ///
    /// 2-byte items are integers with signedness taken from the item type.
    /// 4-byte items are always IEEE floats regardless of the type string;
    /// no archived product stores 4-byte integers.
    pub fn lookup(item_type: ItemType, item_bytes: u32, byte_order: ByteOrder) -> Result<ItemLayout> {
        use ByteOrder::{BigEndian, LittleEndian};

        match (item_bytes, item_type, byte_order) {
            (2, ItemType::SignedInt, BigEndian) => Ok(ItemLayout::I16Be),
            (2, ItemType::SignedInt, LittleEndian) => Ok(ItemLayout::I16Le),
            (2, ItemType::UnsignedInt, BigEndian) => Ok(ItemLayout::U16Be),
            (2, ItemType::UnsignedInt, LittleEndian) => Ok(ItemLayout::U16Le),
            (2, ItemType::IeeeReal, _) => Err(Error::InvalidValue("CORE_ITEM_TYPE")),
            (4, _, BigEndian) => Ok(ItemLayout::F32Be),
            (4, _, LittleEndian) => Ok(ItemLayout::F32Le),
            (n, _, _) => Err(Error::UnsupportedItemSize(n)),
        }
    }
}

/// The axis orders this decoder knows how to lay out, as the label spells
/// them (fastest-varying axis first). Suffix-item placement differs per
/// order, so unknown permutations are rejected rather than generalized.
const SUPPORTED_ORDERS: [[AxisName; 3]; 3] = [
    [AxisName::Sample, AxisName::Band, AxisName::Line],
    [AxisName::Sample, AxisName::Line, AxisName::Band],
    [AxisName::Band, AxisName::Sample, AxisName::Line],
];

/// Canonical dimension index of an axis in a decoded cube
/// (`[band, line, sample]`).
fn canonical_slot(axis: AxisName) -> usize {
    match axis {
        AxisName::Band => 0,
        AxisName::Line => 1,
        AxisName::Sample => 2,
    }
}

/// A fully resolved decode plan for one cube payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Canonical shape `(NB, NL, NS)`.
    pub shape: (usize, usize, usize),
    /// Concrete item layout.
    pub layout: ItemLayout,
    /// Byte offset of the first core item in the file.
    pub data_offset_bytes: usize,
    /// Maps each on-disk dimension, slowest first (C order), to its
    /// canonical dimension. Identity when the disk already stores
    /// `[band][line][sample]`.
    pub axis_permutation: [usize; 3],
    /// Core item extents per on-disk axis, fastest first.
    pub disk_extents: [usize; 3],
    /// Suffix (padding) item counts per on-disk axis, fastest first.
    pub disk_suffix: [usize; 3],
    /// Digital-to-physical multiplier.
    pub multiplier: f64,
    /// Digital-to-physical base offset.
    pub base: f64,
}

impl Geometry {
    /// Resolve a metadata record into a decode plan.
    pub fn resolve(meta: &LabelMetadata) -> Result<Geometry> {
        if !SUPPORTED_ORDERS.contains(&meta.axis_order) {
            let spelled = meta
                .axis_order
                .map(|a| a.to_string())
                .join("-");
            return Err(Error::UnsupportedAxisOrder(spelled));
        }

        let layout = ItemLayout::lookup(meta.item_type, meta.item_bytes, meta.byte_order)?;

        let mut axis_permutation = [0usize; 3];
        for (disk_slot, &axis) in meta.axis_order.iter().rev().enumerate() {
            axis_permutation[disk_slot] = canonical_slot(axis);
        }

        Ok(Geometry {
            shape: (meta.bands(), meta.lines(), meta.samples()),
            layout,
            data_offset_bytes: meta.data_offset_bytes,
            axis_permutation,
            disk_extents: meta.core_items,
            disk_suffix: meta.suffix_items,
            multiplier: meta.multiplier,
            base: meta.base,
        })
    }

    /// Total payload bytes the decoder traverses: full physical rows
    /// (core plus trailing suffix items) and full row blocks (core rows
    /// plus trailing suffix rows). Suffix on the slowest axis lies past
    /// everything we index and is never read.
    ///
    /// Extents come from untrusted label text, so the product is computed
    /// with checked arithmetic; `None` means the declared extents overflow
    /// the address space and can never describe a real payload.
    pub fn payload_byte_len(&self) -> Option<usize> {
        let [e0, e1, e2] = self.disk_extents;
        let [s0, s1, _] = self.disk_suffix;
        e0.checked_add(s0)?
            .checked_mul(e1.checked_add(s1)?)?
            .checked_mul(e2)?
            .checked_mul(self.layout.item_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
            wavelengths: Vec::new(),
            band_numbers: Vec::new(),
            target: None,
            instrument_id: None,
            instrument_host: None,
            flyby: None,
        }
    }

    #[test]
    fn canonical_disk_order_yields_identity_permutation() {
        // SAMPLE fastest, BAND slowest: on disk this is already
        // [band][line][sample] in C order.
        let m = meta([AxisName::Sample, AxisName::Line, AxisName::Band], [6, 4, 3]);
        let g = Geometry::resolve(&m).unwrap();
        assert_eq!(g.axis_permutation, [0, 1, 2]);
        assert_eq!(g.shape, (3, 4, 6));
    }

    #[test]
    fn vims_order_permutation() {
        let m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [6, 3, 4]);
        let g = Geometry::resolve(&m).unwrap();
        // Disk C order is [line][band][sample].
        assert_eq!(g.axis_permutation, [1, 0, 2]);
        assert_eq!(g.shape, (3, 4, 6));
    }

    #[test]
    fn vir_order_permutation() {
        let m = meta([AxisName::Band, AxisName::Sample, AxisName::Line], [3, 6, 4]);
        let g = Geometry::resolve(&m).unwrap();
        // Disk C order is [line][sample][band].
        assert_eq!(g.axis_permutation, [1, 2, 0]);
        assert_eq!(g.shape, (3, 4, 6));
    }

    #[test]
    fn unknown_order_rejected() {
        let m = meta([AxisName::Line, AxisName::Sample, AxisName::Band], [4, 6, 3]);
        match Geometry::resolve(&m) {
            Err(Error::UnsupportedAxisOrder(order)) => {
                assert_eq!(order, "LINE-SAMPLE-BAND");
            }
            other => panic!("expected UnsupportedAxisOrder, got {other:?}"),
        }
    }

    #[test]
    fn item_size_three_rejected() {
        let mut m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [6, 3, 4]);
        m.item_bytes = 3;
        assert!(matches!(
            Geometry::resolve(&m),
            Err(Error::UnsupportedItemSize(3))
        ));
    }

    #[test]
    fn four_byte_items_are_floats() {
        let mut m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [6, 3, 4]);
        m.item_bytes = 4;
        m.item_type = ItemType::SignedInt;
        m.byte_order = ByteOrder::LittleEndian;
        let g = Geometry::resolve(&m).unwrap();
        assert_eq!(g.layout, ItemLayout::F32Le);
    }

    #[test]
    fn two_byte_real_rejected() {
        assert!(matches!(
            ItemLayout::lookup(ItemType::IeeeReal, 2, ByteOrder::BigEndian),
            Err(Error::InvalidValue("CORE_ITEM_TYPE"))
        ));
    }

    #[test]
    fn unsigned_layouts() {
        assert_eq!(
            ItemLayout::lookup(ItemType::UnsignedInt, 2, ByteOrder::LittleEndian).unwrap(),
            ItemLayout::U16Le
        );
    }

    #[test]
    fn payload_length_includes_suffix() {
        let mut m = meta([AxisName::Sample, AxisName::Band, AxisName::Line], [4, 3, 2]);
        m.suffix_items = [1, 1, 0];
        let g = Geometry::resolve(&m).unwrap();
        // (4+1) items * (3+1) rows * 2 blocks * 2 bytes
        assert_eq!(g.payload_byte_len(), Some(5 * 4 * 2 * 2));
    }

    #[test]
    fn overflowing_extents_have_no_payload_length() {
        let m = meta(
            [AxisName::Sample, AxisName::Band, AxisName::Line],
            [usize::MAX / 2, 4, 4],
        );
        let g = Geometry::resolve(&m).unwrap();
        assert_eq!(g.payload_byte_len(), None);
    }
}
