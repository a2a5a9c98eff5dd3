//! Fixed, versioned, little-endian wire types for cross-partition payloads.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn cast_slice_from<T: Pod>(v: &[u8]) -> &[T] {
    bytemuck::cast_slice(v)
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the
/// wire: stored pre-LE with `.to_le()` and decoded with `.from_le()`.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16, // = WIRE_VERSION.to_le()
    pub kind_le: u16,    // 1 = CellViews, 2 = FluxBlock
    pub reserved_le: u32,
}

pub const WIRE_KIND_CELL_VIEWS: u16 = 1;
pub const WIRE_KIND_FLUX_BLOCK: u16 = 2;

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

/// Count of following records.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// Header of one compact cell view: the cell id and its face count.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCellView {
    pub cell_le: u64,
    pub num_faces_le: u32,
    pub _pad: u32, // pad to 8-byte alignment (explicit)
}

impl WireCellView {
    pub const SIZE: usize = 16;
    pub fn new(cell: u64, num_faces: usize) -> Self {
        Self {
            cell_le: cell.to_le(),
            num_faces_le: (num_faces as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn cell(&self) -> u64 {
        u64::from_le(self.cell_le)
    }
    pub fn num_faces(&self) -> usize {
        u32::from_le(self.num_faces_le) as usize
    }
}

/// Header of one face entry within a view: the stream slot and the number
/// of vertex ids that follow as `u64`s.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireFaceEntry {
    pub slot_le: u32,
    pub num_verts_le: u32,
}

impl WireFaceEntry {
    pub const SIZE: usize = 8;
    pub fn new(slot: usize, num_verts: usize) -> Self {
        Self {
            slot_le: (slot as u32).to_le(),
            num_verts_le: (num_verts as u32).to_le(),
        }
    }
    pub fn slot(&self) -> usize {
        u32::from_le(self.slot_le) as usize
    }
    pub fn num_verts(&self) -> usize {
        u32::from_le(self.num_verts_le) as usize
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    assert!(size_of::<WireHdr>() == 8);
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireCellView>() == WireCellView::SIZE);
    assert!(size_of::<WireFaceEntry>() == WireFaceEntry::SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_guard() {
        let hdr = WireHdr::new(WIRE_KIND_FLUX_BLOCK);
        assert_eq!(hdr.version(), WIRE_VERSION);
        assert_eq!(hdr.kind(), WIRE_KIND_FLUX_BLOCK);
    }

    #[test]
    fn roundtrip_cell_view_header() {
        let v = [WireCellView::new(42, 3)];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        let out: &[WireCellView] = cast_slice_from(&bytes);
        assert_eq!(out[0].cell(), 42);
        assert_eq!(out[0].num_faces(), 3);
    }

    #[test]
    fn f64_payload_casts_cleanly() {
        let payload = [1.0f64, -2.5, 0.0];
        let bytes = cast_slice(&payload);
        assert_eq!(bytes.len(), 24);
        let back: &[f64] = cast_slice_from(bytes);
        assert_eq!(back, &payload);
    }
}
