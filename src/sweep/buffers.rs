//! Flux value storage sized from a [`FluxLinkageStore`].
//!
//! One contiguous `f64` buffer per face-size category, one for the delayed
//! lock box, and one per neighbor rank stream. All face access goes through
//! the store's offsets, so a face's values are always a contiguous
//! `dofs`-long slice.

use std::collections::BTreeMap;

use crate::mesh::id::CellId;
use crate::sweep::fluds::FluxLinkageStore;
use crate::sweep_error::SweepError;

/// Mutable flux values laid out by a [`FluxLinkageStore`].
#[derive(Clone, Debug)]
pub struct FluxBuffers {
    local: Vec<Vec<f64>>,
    delayed: Vec<f64>,
    outgoing: BTreeMap<usize, Vec<f64>>,
    incoming: BTreeMap<usize, Vec<f64>>,
}

impl FluxBuffers {
    /// Allocate zeroed buffers matching `store`'s layout.
    pub fn allocate(store: &FluxLinkageStore) -> Result<Self, SweepError> {
        let mut local = Vec::with_capacity(store.num_categories());
        for cat in 0..store.num_categories() {
            local.push(vec![0.0; store.buffer_len(cat)?]);
        }
        let delayed = vec![0.0; store.delayed_buffer_len()];
        let mut outgoing = BTreeMap::new();
        for rank in store.successor_ranks() {
            outgoing.insert(rank, vec![0.0; store.successor_buffer_len(rank)?]);
        }
        let mut incoming = BTreeMap::new();
        for rank in store.predecessor_ranks() {
            incoming.insert(rank, vec![0.0; store.predecessor_buffer_len(rank)?]);
        }
        Ok(Self {
            local,
            delayed,
            outgoing,
            incoming,
        })
    }

    /// Values produced by a local outgoing face, for writing.
    pub fn outgoing_face_mut(
        &mut self,
        store: &FluxLinkageStore,
        cell: CellId,
        face: usize,
        group: usize,
    ) -> Result<&mut [f64], SweepError> {
        let (cat, slot) = store.local_outgoing_slot(cell, face)?;
        let offset = store.offset_for(cat, slot, group)?;
        let dofs = store.category_dofs(cat)?;
        Ok(&mut self.local[cat][offset..offset + dofs])
    }

    /// Upwind values backing a local incoming face.
    pub fn upwind_face(
        &self,
        store: &FluxLinkageStore,
        cell: CellId,
        face: usize,
        group: usize,
    ) -> Result<&[f64], SweepError> {
        let (cat, slot) = store.local_incoming_slot(cell, face)?;
        let offset = store.offset_for(cat, slot, group)?;
        let dofs = store.category_dofs(cat)?;
        Ok(&self.local[cat][offset..offset + dofs])
    }

    /// Values produced by a delayed cell's outgoing face, for writing.
    pub fn delayed_face_mut(
        &mut self,
        store: &FluxLinkageStore,
        cell: CellId,
        face: usize,
        group: usize,
    ) -> Result<&mut [f64], SweepError> {
        let slot = store.delayed_outgoing_slot(cell, face)?;
        let offset = store.delayed_offset_for(slot, group)?;
        let dofs = store.delayed_dofs();
        Ok(&mut self.delayed[offset..offset + dofs])
    }

    /// Upwind values backing an incoming face fed by a delayed cell.
    pub fn delayed_upwind_face(
        &self,
        store: &FluxLinkageStore,
        cell: CellId,
        face: usize,
        group: usize,
    ) -> Result<&[f64], SweepError> {
        let slot = store.delayed_incoming_slot(cell, face)?;
        let offset = store.delayed_offset_for(slot, group)?;
        let dofs = store.delayed_dofs();
        Ok(&self.delayed[offset..offset + dofs])
    }

    /// Values bound for a successor rank, for writing.
    pub fn send_face_mut(
        &mut self,
        store: &FluxLinkageStore,
        cell: CellId,
        face: usize,
        group: usize,
    ) -> Result<&mut [f64], SweepError> {
        let (rank, slot) = store.successor_slot(cell, face)?;
        let offset = store.successor_offset(rank, slot, group)?;
        let dofs = store.successor_face_dofs(rank, slot)?;
        let buf = self
            .outgoing
            .get_mut(&rank)
            .ok_or(SweepError::UnknownNeighborRank(rank))?;
        Ok(&mut buf[offset..offset + dofs])
    }

    /// Values received for a cross-partition incoming face.
    pub fn recv_face(
        &self,
        store: &FluxLinkageStore,
        cell: CellId,
        face: usize,
        group: usize,
    ) -> Result<&[f64], SweepError> {
        let (rank, slot) = store.predecessor_slot(cell, face)?;
        let offset = store.predecessor_offset(rank, slot, group)?;
        let dofs = store.predecessor_face_dofs(rank, slot)?;
        let buf = self
            .incoming
            .get(&rank)
            .ok_or(SweepError::UnknownNeighborRank(rank))?;
        Ok(&buf[offset..offset + dofs])
    }

    /// The whole buffer bound for successor `rank`.
    pub fn send_buffer(&self, rank: usize) -> Result<&[f64], SweepError> {
        self.outgoing
            .get(&rank)
            .map(Vec::as_slice)
            .ok_or(SweepError::UnknownNeighborRank(rank))
    }

    /// The whole buffer receiving from predecessor `rank`, for writing.
    pub fn recv_buffer_mut(&mut self, rank: usize) -> Result<&mut Vec<f64>, SweepError> {
        self.incoming
            .get_mut(&rank)
            .ok_or(SweepError::UnknownNeighborRank(rank))
    }
}
