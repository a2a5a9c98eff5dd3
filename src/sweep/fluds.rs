//! Flux linkage store: buffer layout and indexing for face-crossing flux.
//!
//! Built once per (direction, partition) pairing from a [`SweepOrdering`]
//! and reused across repeated sweeps. The store owns no flux values itself;
//! it assigns every value-carrying face a slot in one of four places:
//!
//! - a **lock box** per face-size category, for faces crossed between two
//!   non-delayed cells of this partition — uniformly strided, so a single
//!   contiguous buffer serves all groups and all same-category faces;
//! - the **delayed lock box** for faces produced by delayed cells, strided
//!   by the single largest face dof count in the grid (no bucketing;
//!   the cyclic path is rare, so simplicity wins over density);
//! - a per-**successor** stream for faces sent to another partition;
//! - a per-**predecessor** stream for faces received from another
//!   partition, described by compact cell views so a neighbor cell shared
//!   by several faces is never re-described.
//!
//! Construction is single-threaded and the store is read-only afterwards;
//! the flux buffers it indexes are mutated during the sweep, not the store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::mesh::cell::FaceNeighbor;
use crate::mesh::grid::Grid;
use crate::mesh::id::CellId;
use crate::sweep::spds::{FaceOrientation, SweepOrdering, classify};
use crate::sweep_error::SweepError;

/// Minimal description of one neighbor cell's needed faces: the cell id
/// plus `(face slot, vertex ids)` pairs, one per registered face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactCellView {
    pub cell: CellId,
    pub faces: Vec<(usize, Vec<usize>)>,
}

/// Append a face to `views`, allocating a new view only on the first
/// occurrence of `cell`.
///
/// The linear scan is deliberate: per-partition neighbor sets stay small.
/// Swap in a map keyed by cell id if that ever changes; the observable
/// contract stays the same.
pub(crate) fn add_face_view(
    views: &mut Vec<CompactCellView>,
    cell: CellId,
    slot: usize,
    vertex_ids: &[usize],
) {
    for view in views.iter_mut() {
        if view.cell == cell {
            view.faces.push((slot, vertex_ids.to_vec()));
            return;
        }
    }
    views.push(CompactCellView {
        cell,
        faces: vec![(slot, vertex_ids.to_vec())],
    });
}

/// One registered cross-partition face, before slot assignment.
///
/// `key` is the *producer-side* `(cell, face)` pair. Both endpoints of a
/// partition pairing sort their stream by this key, so sender and receiver
/// agree on the slot layout without communicating it.
struct StreamEntry {
    key: (CellId, usize),
    dofs: usize,
    view_cell: CellId,
    view_verts: Vec<usize>,
    local_face: (CellId, usize),
}

/// One neighbor rank's face stream: slot-ordered dof counts, their prefix
/// offsets into the (per-group) stream buffer, and the cell views that
/// describe the faces.
#[derive(Clone, Debug, Default)]
struct RemoteStream {
    face_dofs: Vec<usize>,
    prefix: Vec<usize>,
    total_dofs: usize,
    views: Vec<CompactCellView>,
}

impl RemoteStream {
    fn seal(&mut self) {
        let mut offset = 0;
        self.prefix = Vec::with_capacity(self.face_dofs.len());
        for &dofs in &self.face_dofs {
            self.prefix.push(offset);
            offset += dofs;
        }
        self.total_dofs = offset;
        self.face_dofs.shrink_to_fit();
        self.views.shrink_to_fit();
        for view in &mut self.views {
            view.faces.shrink_to_fit();
        }
    }
}

/// Sort each rank's entries by producer-side key, assign slots, and build
/// the sealed streams plus the `(cell, face) -> (rank, slot)` lookup.
fn seal_streams(
    entries: BTreeMap<usize, Vec<StreamEntry>>,
) -> (
    BTreeMap<usize, RemoteStream>,
    HashMap<(CellId, usize), (usize, usize)>,
) {
    let mut streams = BTreeMap::new();
    let mut slots = HashMap::new();
    for (rank, mut rank_entries) in entries {
        rank_entries.sort_by(|a, b| a.key.cmp(&b.key));
        let mut stream = RemoteStream::default();
        for (slot, entry) in rank_entries.iter().enumerate() {
            stream.face_dofs.push(entry.dofs);
            add_face_view(&mut stream.views, entry.view_cell, slot, &entry.view_verts);
            slots.insert(entry.local_face, (rank, slot));
        }
        stream.seal();
        streams.insert(rank, stream);
    }
    (streams, slots)
}

/// Per-direction flux buffer layout for one partition.
#[derive(Clone, Debug)]
pub struct FluxLinkageStore {
    num_groups: usize,
    /// Dofs per face in each category (the category's stride).
    category_dofs: Vec<usize>,
    /// Slots claimed in each category's lock box.
    category_slots: Vec<usize>,
    /// `dofs × slots` per category.
    category_block_stride: Vec<usize>,
    delayed_dofs: usize,
    delayed_slots: usize,
    delayed_block_stride: usize,
    outgoing: HashMap<(CellId, usize), (usize, usize)>,
    incoming: HashMap<(CellId, usize), (usize, usize)>,
    delayed_outgoing: HashMap<(CellId, usize), usize>,
    delayed_incoming: HashMap<(CellId, usize), usize>,
    successor_slots: HashMap<(CellId, usize), (usize, usize)>,
    predecessor_slots: HashMap<(CellId, usize), (usize, usize)>,
    successor_streams: BTreeMap<usize, RemoteStream>,
    predecessor_streams: BTreeMap<usize, RemoteStream>,
    boundary_dependencies: Vec<u32>,
}

impl FluxLinkageStore {
    /// Lay out flux buffers for the partition and direction `ordering` was
    /// built for, with `num_groups` energy groups per face slot.
    ///
    /// Idempotent given the same inputs; discard and rebuild when the
    /// direction set changes.
    pub fn build(
        grid: &Grid,
        ordering: &SweepOrdering,
        num_groups: usize,
    ) -> Result<Self, SweepError> {
        if num_groups == 0 {
            return Err(SweepError::ZeroGroups);
        }
        let rank = ordering.rank();
        let direction = ordering.direction();
        let histogram = grid.histogram();
        let num_categories = histogram.num_categories();

        let mut category_slots = vec![0usize; num_categories];
        let mut delayed_slots = 0usize;
        let mut outgoing = HashMap::new();
        let mut incoming = HashMap::new();
        let mut delayed_outgoing = HashMap::new();
        let mut delayed_incoming = HashMap::new();
        let mut successor_entries: BTreeMap<usize, Vec<StreamEntry>> = BTreeMap::new();
        let mut predecessor_entries: BTreeMap<usize, Vec<StreamEntry>> = BTreeMap::new();
        let mut boundary_deps: BTreeSet<u32> = BTreeSet::new();

        // Strict order first, then the delayed cells, both in candidate
        // order: the claim sequence (and with it every slot index) is
        // reproducible.
        let sequence: Vec<CellId> = ordering
            .order()
            .iter()
            .chain(ordering.delayed().iter())
            .copied()
            .collect();

        // Slot dynamics: claim a slot for every face this partition's
        // cells produce, and register cross-partition faces against the
        // neighbor rank's stream.
        for &cell_id in &sequence {
            let cell = grid.cell(cell_id)?;
            let producer_delayed = ordering.is_delayed(cell_id);
            for (f, face) in cell.faces.iter().enumerate() {
                match classify(face.normal, direction) {
                    FaceOrientation::Outgoing => match face.neighbor {
                        FaceNeighbor::Cell(nbr_id) => {
                            let nbr = grid.cell(nbr_id)?;
                            if nbr.partition == rank {
                                if producer_delayed {
                                    delayed_outgoing.insert((cell_id, f), delayed_slots);
                                    delayed_slots += 1;
                                } else {
                                    let cat = histogram.category_of(face.dof_count())?;
                                    outgoing.insert((cell_id, f), (cat, category_slots[cat]));
                                    category_slots[cat] += 1;
                                }
                            } else {
                                successor_entries.entry(nbr.partition).or_default().push(
                                    StreamEntry {
                                        key: (cell_id, f),
                                        dofs: face.dof_count(),
                                        view_cell: cell_id,
                                        view_verts: face.vertex_ids.clone(),
                                        local_face: (cell_id, f),
                                    },
                                );
                            }
                        }
                        FaceNeighbor::Boundary(_) => {}
                        FaceNeighbor::Unresolved => {
                            return Err(SweepError::UnresolvedNeighbor {
                                cell: cell_id,
                                face: f,
                            });
                        }
                    },
                    FaceOrientation::Incoming => match face.neighbor {
                        FaceNeighbor::Cell(nbr_id) => {
                            let nbr = grid.cell(nbr_id)?;
                            if nbr.partition != rank {
                                let mf = nbr.mutual_face(cell_id).ok_or(
                                    SweepError::NonMutualFace {
                                        cell: cell_id,
                                        face: f,
                                        neighbor: nbr_id,
                                    },
                                )?;
                                predecessor_entries.entry(nbr.partition).or_default().push(
                                    StreamEntry {
                                        key: (nbr_id, mf),
                                        dofs: face.dof_count(),
                                        view_cell: nbr_id,
                                        view_verts: nbr.faces[mf].vertex_ids.clone(),
                                        local_face: (cell_id, f),
                                    },
                                );
                            }
                        }
                        FaceNeighbor::Boundary(marker) => {
                            boundary_deps.insert(marker);
                        }
                        FaceNeighbor::Unresolved => {
                            return Err(SweepError::UnresolvedNeighbor {
                                cell: cell_id,
                                face: f,
                            });
                        }
                    },
                }
            }
        }

        // Incident mapping: resolve every local incoming face to the slot
        // its upwind neighbor claimed, through the mutual-face invariant.
        for &cell_id in &sequence {
            let cell = grid.cell(cell_id)?;
            for (f, face) in cell.faces.iter().enumerate() {
                if classify(face.normal, direction) != FaceOrientation::Incoming {
                    continue;
                }
                let Some(nbr_id) = face.neighbor.cell() else {
                    continue;
                };
                let nbr = grid.cell(nbr_id)?;
                if nbr.partition != rank {
                    continue;
                }
                let mf = nbr
                    .mutual_face(cell_id)
                    .ok_or(SweepError::NonMutualFace {
                        cell: cell_id,
                        face: f,
                        neighbor: nbr_id,
                    })?;
                if ordering.is_delayed(nbr_id) {
                    let slot = *delayed_outgoing.get(&(nbr_id, mf)).ok_or(
                        SweepError::SlotNotFound {
                            cell: nbr_id,
                            face: mf,
                        },
                    )?;
                    delayed_incoming.insert((cell_id, f), slot);
                } else {
                    let claim = *outgoing.get(&(nbr_id, mf)).ok_or(SweepError::SlotNotFound {
                        cell: nbr_id,
                        face: mf,
                    })?;
                    incoming.insert((cell_id, f), claim);
                }
            }
        }

        let mut category_dofs = Vec::with_capacity(num_categories);
        let mut category_block_stride = Vec::with_capacity(num_categories);
        for (cat, &slots) in category_slots.iter().enumerate() {
            let dofs = histogram.dofs_for(cat)?;
            category_dofs.push(dofs);
            category_block_stride.push(dofs * slots);
        }
        let delayed_dofs = histogram.largest_face();
        let delayed_block_stride = delayed_dofs * delayed_slots;

        let (successor_streams, successor_slots) = seal_streams(successor_entries);
        let (predecessor_streams, predecessor_slots) = seal_streams(predecessor_entries);

        log::debug!(
            "rank {rank}: flux linkage store built ({} categor(ies), {} local slot(s), {} delayed slot(s), {} succ stream(s), {} pred stream(s))",
            num_categories,
            category_slots.iter().sum::<usize>(),
            delayed_slots,
            successor_streams.len(),
            predecessor_streams.len()
        );

        Ok(Self {
            num_groups,
            category_dofs,
            category_slots,
            category_block_stride,
            delayed_dofs,
            delayed_slots,
            delayed_block_stride,
            outgoing,
            incoming,
            delayed_outgoing,
            delayed_incoming,
            successor_slots,
            predecessor_slots,
            successor_streams,
            predecessor_streams,
            boundary_dependencies: boundary_deps.into_iter().collect(),
        })
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    #[inline]
    pub fn num_categories(&self) -> usize {
        self.category_dofs.len()
    }

    /// Dofs per face in `category`.
    pub fn category_dofs(&self, category: usize) -> Result<usize, SweepError> {
        self.category_dofs
            .get(category)
            .copied()
            .ok_or(SweepError::UnknownFaceCategory(category))
    }

    /// Slots claimed in `category`'s lock box.
    pub fn category_slots(&self, category: usize) -> Result<usize, SweepError> {
        self.category_slots
            .get(category)
            .copied()
            .ok_or(SweepError::UnknownFaceCategory(category))
    }

    /// Offset of `(slot, group)` within `category`'s flux buffer.
    ///
    /// Layout is group-major: `group · (dofs × slots) + slot · dofs`, an
    /// injective map over the store's valid domain.
    pub fn offset_for(
        &self,
        category: usize,
        slot: usize,
        group: usize,
    ) -> Result<usize, SweepError> {
        let dofs = self.category_dofs(category)?;
        let max = self.category_slots[category];
        if slot >= max {
            return Err(SweepError::SlotOutOfRange {
                category,
                slot,
                max,
            });
        }
        self.check_group(group)?;
        Ok(group * self.category_block_stride[category] + slot * dofs)
    }

    /// Length of `category`'s flux buffer over all groups.
    pub fn buffer_len(&self, category: usize) -> Result<usize, SweepError> {
        self.category_dofs(category)?;
        Ok(self.num_groups * self.category_block_stride[category])
    }

    /// Stride of the delayed lock box (the grid's largest face).
    #[inline]
    pub fn delayed_dofs(&self) -> usize {
        self.delayed_dofs
    }

    #[inline]
    pub fn delayed_slots(&self) -> usize {
        self.delayed_slots
    }

    /// Offset of `(slot, group)` within the delayed flux buffer.
    pub fn delayed_offset_for(&self, slot: usize, group: usize) -> Result<usize, SweepError> {
        if slot >= self.delayed_slots {
            return Err(SweepError::DelayedSlotOutOfRange {
                slot,
                max: self.delayed_slots,
            });
        }
        self.check_group(group)?;
        Ok(group * self.delayed_block_stride + slot * self.delayed_dofs)
    }

    /// Length of the delayed flux buffer over all groups.
    #[inline]
    pub fn delayed_buffer_len(&self) -> usize {
        self.num_groups * self.delayed_block_stride
    }

    /// Lock-box claim of a local outgoing face: `(category, slot)`.
    pub fn local_outgoing_slot(
        &self,
        cell: CellId,
        face: usize,
    ) -> Result<(usize, usize), SweepError> {
        self.outgoing
            .get(&(cell, face))
            .copied()
            .ok_or(SweepError::SlotNotFound { cell, face })
    }

    /// Claim backing a local incoming face (its upwind neighbor's slot).
    pub fn local_incoming_slot(
        &self,
        cell: CellId,
        face: usize,
    ) -> Result<(usize, usize), SweepError> {
        self.incoming
            .get(&(cell, face))
            .copied()
            .ok_or(SweepError::SlotNotFound { cell, face })
    }

    /// Delayed-box claim of an outgoing face produced by a delayed cell.
    pub fn delayed_outgoing_slot(&self, cell: CellId, face: usize) -> Result<usize, SweepError> {
        self.delayed_outgoing
            .get(&(cell, face))
            .copied()
            .ok_or(SweepError::SlotNotFound { cell, face })
    }

    /// Delayed-box slot backing an incoming face whose upwind neighbor is
    /// delayed.
    pub fn delayed_incoming_slot(&self, cell: CellId, face: usize) -> Result<usize, SweepError> {
        self.delayed_incoming
            .get(&(cell, face))
            .copied()
            .ok_or(SweepError::SlotNotFound { cell, face })
    }

    /// Stream claim of a cross-partition outgoing face: `(rank, slot)`.
    pub fn successor_slot(&self, cell: CellId, face: usize) -> Result<(usize, usize), SweepError> {
        self.successor_slots
            .get(&(cell, face))
            .copied()
            .ok_or(SweepError::SlotNotFound { cell, face })
    }

    /// Stream claim of a cross-partition incoming face: `(rank, slot)`.
    pub fn predecessor_slot(
        &self,
        cell: CellId,
        face: usize,
    ) -> Result<(usize, usize), SweepError> {
        self.predecessor_slots
            .get(&(cell, face))
            .copied()
            .ok_or(SweepError::SlotNotFound { cell, face })
    }

    /// Successor ranks with at least one registered face, ascending.
    pub fn successor_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.successor_streams.keys().copied()
    }

    /// Predecessor ranks with at least one registered face, ascending.
    pub fn predecessor_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.predecessor_streams.keys().copied()
    }

    /// Cell views describing what must be sent to `rank`.
    pub fn successor_views(&self, rank: usize) -> Result<&[CompactCellView], SweepError> {
        self.successor_streams
            .get(&rank)
            .map(|s| s.views.as_slice())
            .ok_or(SweepError::UnknownNeighborRank(rank))
    }

    /// The compact view of neighbor `cell` registered for predecessor
    /// `rank`.
    pub fn compact_view_for(
        &self,
        rank: usize,
        cell: CellId,
    ) -> Result<&CompactCellView, SweepError> {
        let stream = self
            .predecessor_streams
            .get(&rank)
            .ok_or(SweepError::UnknownNeighborRank(rank))?;
        stream
            .views
            .iter()
            .find(|v| v.cell == cell)
            .ok_or(SweepError::ViewNotFound { rank, cell })
    }

    /// Offset of `(slot, group)` within the buffer sent to successor
    /// `rank`.
    pub fn successor_offset(
        &self,
        rank: usize,
        slot: usize,
        group: usize,
    ) -> Result<usize, SweepError> {
        Self::stream_offset(&self.successor_streams, rank, slot, group, self.num_groups)
    }

    /// Offset of `(slot, group)` within the buffer received from
    /// predecessor `rank`.
    pub fn predecessor_offset(
        &self,
        rank: usize,
        slot: usize,
        group: usize,
    ) -> Result<usize, SweepError> {
        Self::stream_offset(
            &self.predecessor_streams,
            rank,
            slot,
            group,
            self.num_groups,
        )
    }

    /// Dofs carried by slot `slot` of the stream sent to successor `rank`.
    pub fn successor_face_dofs(&self, rank: usize, slot: usize) -> Result<usize, SweepError> {
        Self::stream_face_dofs(&self.successor_streams, rank, slot)
    }

    /// Dofs carried by slot `slot` of the stream received from predecessor
    /// `rank`.
    pub fn predecessor_face_dofs(&self, rank: usize, slot: usize) -> Result<usize, SweepError> {
        Self::stream_face_dofs(&self.predecessor_streams, rank, slot)
    }

    /// Length of the buffer exchanged with successor `rank`.
    pub fn successor_buffer_len(&self, rank: usize) -> Result<usize, SweepError> {
        self.successor_streams
            .get(&rank)
            .map(|s| s.total_dofs * self.num_groups)
            .ok_or(SweepError::UnknownNeighborRank(rank))
    }

    /// Length of the buffer exchanged with predecessor `rank`.
    pub fn predecessor_buffer_len(&self, rank: usize) -> Result<usize, SweepError> {
        self.predecessor_streams
            .get(&rank)
            .map(|s| s.total_dofs * self.num_groups)
            .ok_or(SweepError::UnknownNeighborRank(rank))
    }

    /// Boundary markers feeding this partition's incoming faces, ascending.
    #[inline]
    pub fn boundary_dependencies(&self) -> &[u32] {
        &self.boundary_dependencies
    }

    fn check_group(&self, group: usize) -> Result<(), SweepError> {
        if group >= self.num_groups {
            return Err(SweepError::GroupOutOfRange {
                group,
                num_groups: self.num_groups,
            });
        }
        Ok(())
    }

    fn stream_face_dofs(
        streams: &BTreeMap<usize, RemoteStream>,
        rank: usize,
        slot: usize,
    ) -> Result<usize, SweepError> {
        let stream = streams
            .get(&rank)
            .ok_or(SweepError::UnknownNeighborRank(rank))?;
        stream
            .face_dofs
            .get(slot)
            .copied()
            .ok_or(SweepError::RemoteSlotOutOfRange {
                rank,
                slot,
                max: stream.face_dofs.len(),
            })
    }

    fn stream_offset(
        streams: &BTreeMap<usize, RemoteStream>,
        rank: usize,
        slot: usize,
        group: usize,
        num_groups: usize,
    ) -> Result<usize, SweepError> {
        let stream = streams
            .get(&rank)
            .ok_or(SweepError::UnknownNeighborRank(rank))?;
        let max = stream.face_dofs.len();
        if slot >= max {
            return Err(SweepError::RemoteSlotOutOfRange { rank, slot, max });
        }
        if group >= num_groups {
            return Err(SweepError::GroupOutOfRange { group, num_groups });
        }
        Ok(group * stream.total_dofs + stream.prefix[slot])
    }
}
