//! Cross-partition flux and cell-view exchange.
//!
//! The run-time sweep blocks on predecessor flux before finalizing the
//! corresponding cells; this module owns that exchange. Receives are posted
//! before sends so pairwise exchanges make progress regardless of rank
//! order, and every payload is length-checked before it is trusted.
//!
//! Cell-view exchange is a build-time handshake: each partition derives its
//! neighbor streams independently from the replicated grid, and the views
//! received from a predecessor must match the views computed locally. A
//! mismatch means the two partitions disagree about the mesh.

use std::collections::BTreeMap;

use crate::comm::wire::{
    self, WIRE_KIND_CELL_VIEWS, WireCellView, WireCount, WireFaceEntry, WireHdr,
};
use crate::comm::{Communicator, Wait};
use crate::mesh::id::CellId;
use crate::sweep::buffers::FluxBuffers;
use crate::sweep::fluds::{CompactCellView, FluxLinkageStore};
use crate::sweep_error::SweepError;

/// Send outgoing flux to every successor and receive predecessor flux into
/// `buffers`, blocking until all transfers complete.
pub fn exchange_flux<C: Communicator>(
    comm: &C,
    store: &FluxLinkageStore,
    buffers: &mut FluxBuffers,
    tag: u16,
) -> Result<(), SweepError> {
    let mut receives = Vec::new();
    for rank in store.predecessor_ranks() {
        let expected = store.predecessor_buffer_len(rank)? * size_of::<f64>();
        let mut scratch = vec![0u8; expected];
        let handle = comm.irecv(rank, tag, &mut scratch);
        receives.push((rank, expected, handle));
    }

    let mut sends = Vec::new();
    for rank in store.successor_ranks() {
        let payload = wire::cast_slice(buffers.send_buffer(rank)?);
        sends.push(comm.isend(rank, tag, payload));
    }
    for send in sends {
        let _ = send.wait();
    }

    for (rank, expected, handle) in receives {
        let data = handle.wait().ok_or_else(|| SweepError::CommError {
            neighbor: rank,
            reason: "no data received (wait returned None)".into(),
        })?;
        if data.len() != expected {
            return Err(SweepError::BufferSizeMismatch {
                neighbor: rank,
                expected,
                got: data.len(),
            });
        }
        let values: &[f64] = wire::cast_slice_from(&data);
        buffers.recv_buffer_mut(rank)?.copy_from_slice(values);
    }
    Ok(())
}

/// Encode compact cell views into a versioned wire payload.
pub fn encode_cell_views(views: &[CompactCellView]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(wire::cast_slice(&[WireHdr::new(WIRE_KIND_CELL_VIEWS)]));
    out.extend_from_slice(wire::cast_slice(&[WireCount::new(views.len())]));
    for view in views {
        out.extend_from_slice(wire::cast_slice(&[WireCellView::new(
            view.cell.get(),
            view.faces.len(),
        )]));
        for (slot, verts) in &view.faces {
            out.extend_from_slice(wire::cast_slice(&[WireFaceEntry::new(*slot, verts.len())]));
            for &v in verts {
                out.extend_from_slice(&(v as u64).to_le_bytes());
            }
        }
    }
    out
}

/// Decode a payload produced by [`encode_cell_views`].
pub fn decode_cell_views(bytes: &[u8]) -> Result<Vec<CompactCellView>, SweepError> {
    let mut cursor = Cursor { bytes, at: 0 };
    let hdr: WireHdr = cursor.read()?;
    if hdr.version() != wire::WIRE_VERSION {
        return Err(SweepError::MalformedWire(format!(
            "wire version {} (expected {})",
            hdr.version(),
            wire::WIRE_VERSION
        )));
    }
    if hdr.kind() != WIRE_KIND_CELL_VIEWS {
        return Err(SweepError::MalformedWire(format!(
            "unexpected payload kind {}",
            hdr.kind()
        )));
    }
    let count: WireCount = cursor.read()?;
    let mut views = Vec::with_capacity(count.get());
    for _ in 0..count.get() {
        let view_hdr: WireCellView = cursor.read()?;
        let cell = CellId::try_new(view_hdr.cell())?;
        let mut faces = Vec::with_capacity(view_hdr.num_faces());
        for _ in 0..view_hdr.num_faces() {
            let entry: WireFaceEntry = cursor.read()?;
            let mut verts = Vec::with_capacity(entry.num_verts());
            for _ in 0..entry.num_verts() {
                verts.push(cursor.read_u64()? as usize);
            }
            faces.push((entry.slot(), verts));
        }
        views.push(CompactCellView { cell, faces });
    }
    if cursor.at != bytes.len() {
        return Err(SweepError::MalformedWire(format!(
            "{} trailing byte(s)",
            bytes.len() - cursor.at
        )));
    }
    Ok(views)
}

/// Send this partition's successor views and receive each predecessor's
/// view of what it will send us, keyed by predecessor rank.
///
/// Callers compare the result against [`FluxLinkageStore::compact_view_for`]
/// to verify both sides derived the same stream layout.
pub fn exchange_cell_views<C: Communicator>(
    comm: &C,
    store: &FluxLinkageStore,
    tag: u16,
) -> Result<BTreeMap<usize, Vec<CompactCellView>>, SweepError> {
    // View payloads are variable-length: exchange byte counts first.
    let mut size_receives = Vec::new();
    for rank in store.predecessor_ranks() {
        let mut scratch = [0u8; size_of::<u64>()];
        let handle = comm.irecv(rank, tag, &mut scratch);
        size_receives.push((rank, handle));
    }
    let mut payloads = BTreeMap::new();
    for rank in store.successor_ranks() {
        payloads.insert(rank, encode_cell_views(store.successor_views(rank)?));
    }
    let mut size_sends = Vec::new();
    for (&rank, payload) in &payloads {
        let len = (payload.len() as u64).to_le_bytes();
        size_sends.push(comm.isend(rank, tag, &len));
    }
    for send in size_sends {
        let _ = send.wait();
    }
    let mut expected_sizes = BTreeMap::new();
    for (rank, handle) in size_receives {
        let data = handle.wait().ok_or_else(|| SweepError::CommError {
            neighbor: rank,
            reason: "no view size received".into(),
        })?;
        if data.len() != size_of::<u64>() {
            return Err(SweepError::BufferSizeMismatch {
                neighbor: rank,
                expected: size_of::<u64>(),
                got: data.len(),
            });
        }
        let mut raw = [0u8; size_of::<u64>()];
        raw.copy_from_slice(&data);
        expected_sizes.insert(rank, u64::from_le_bytes(raw) as usize);
    }

    let data_tag = tag.wrapping_add(1);
    let mut data_receives = Vec::new();
    for (&rank, &expected) in &expected_sizes {
        let mut scratch = vec![0u8; expected];
        let handle = comm.irecv(rank, data_tag, &mut scratch);
        data_receives.push((rank, expected, handle));
    }
    let mut data_sends = Vec::new();
    for (&rank, payload) in &payloads {
        data_sends.push(comm.isend(rank, data_tag, payload));
    }
    for send in data_sends {
        let _ = send.wait();
    }

    let mut received = BTreeMap::new();
    for (rank, expected, handle) in data_receives {
        let data = handle.wait().ok_or_else(|| SweepError::CommError {
            neighbor: rank,
            reason: "no view payload received".into(),
        })?;
        if data.len() != expected {
            return Err(SweepError::BufferSizeMismatch {
                neighbor: rank,
                expected,
                got: data.len(),
            });
        }
        received.insert(rank, decode_cell_views(&data)?);
    }
    Ok(received)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], SweepError> {
        if self.at + n > self.bytes.len() {
            return Err(SweepError::MalformedWire(format!(
                "truncated payload at byte {} (wanted {n} more of {})",
                self.at,
                self.bytes.len()
            )));
        }
        let slice = &self.bytes[self.at..self.at + n];
        self.at += n;
        Ok(slice)
    }

    fn read<T: bytemuck::Pod>(&mut self) -> Result<T, SweepError> {
        Ok(bytemuck::pod_read_unaligned(self.take(size_of::<T>())?))
    }

    fn read_u64(&mut self) -> Result<u64, SweepError> {
        let mut raw = [0u8; size_of::<u64>()];
        raw.copy_from_slice(self.take(size_of::<u64>())?);
        Ok(u64::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_views_survive_the_wire() {
        let views = vec![
            CompactCellView {
                cell: CellId::new(4),
                faces: vec![(0, vec![7, 8, 9]), (2, vec![9, 10])],
            },
            CompactCellView {
                cell: CellId::new(11),
                faces: vec![(1, vec![3])],
            },
        ];
        let bytes = encode_cell_views(&views);
        assert_eq!(decode_cell_views(&bytes).unwrap(), views);
    }

    #[test]
    fn truncated_payload_rejected() {
        let views = vec![CompactCellView {
            cell: CellId::new(1),
            faces: vec![(0, vec![1, 2])],
        }];
        let bytes = encode_cell_views(&views);
        let err = decode_cell_views(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, SweepError::MalformedWire(_)));
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut bytes = encode_cell_views(&[]);
        // Corrupt the kind field.
        bytes[2] = 0x7f;
        assert!(matches!(
            decode_cell_views(&bytes).unwrap_err(),
            SweepError::MalformedWire(_)
        ));
    }
}
