use mesh_sweep::mesh::build::{boundary, prism_stack, quad_mesh, segment_chain};
use mesh_sweep::mesh::id::CellId;
use mesh_sweep::sweep::buffers::FluxBuffers;
use mesh_sweep::sweep::fluds::FluxLinkageStore;
use mesh_sweep::sweep::spds::SweepOrdering;
use mesh_sweep::sweep_error::SweepError;

const PLUS_X: [f64; 3] = [1.0, 0.0, 0.0];
const PLUS_Z: [f64; 3] = [0.0, 0.0, 1.0];

#[test]
fn chain_claims_interior_transfers() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0], &[0, 0, 0], false).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
    let store = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();

    // Two interior faces, one category (single-vertex faces).
    assert_eq!(store.num_categories(), 1);
    assert_eq!(store.category_dofs(0), Ok(1));
    assert_eq!(store.category_slots(0), Ok(2));
    assert_eq!(store.buffer_len(0), Ok(4));

    // Claims follow sweep order; incoming faces resolve to the upwind
    // neighbor's claim.
    assert_eq!(store.local_outgoing_slot(CellId::new(1), 1), Ok((0, 0)));
    assert_eq!(store.local_outgoing_slot(CellId::new(2), 1), Ok((0, 1)));
    assert_eq!(store.local_incoming_slot(CellId::new(2), 0), Ok((0, 0)));
    assert_eq!(store.local_incoming_slot(CellId::new(3), 0), Ok((0, 1)));

    // Only the upwind chain end feeds from a boundary.
    assert_eq!(store.boundary_dependencies(), &[boundary::XMIN]);

    assert!(store.predecessor_ranks().next().is_none());
    assert!(store.successor_ranks().next().is_none());
}

#[test]
fn offsets_are_group_major_and_injective() {
    let grid = prism_stack(3, &[0, 0, 0]).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, PLUS_Z).unwrap();
    let store = FluxLinkageStore::build(&grid, &ordering, 3).unwrap();

    // Shared faces are triangles; the quad category exists but claims no
    // slots for this direction.
    assert_eq!(store.num_categories(), 2);
    assert_eq!(store.category_dofs(0), Ok(3));
    assert_eq!(store.category_slots(0), Ok(2));
    assert_eq!(store.category_slots(1), Ok(0));

    for cat in 0..store.num_categories() {
        let dofs = store.category_dofs(cat).unwrap();
        let slots = store.category_slots(cat).unwrap();
        let len = store.buffer_len(cat).unwrap();
        let mut offsets = Vec::new();
        for group in 0..store.num_groups() {
            for slot in 0..slots {
                offsets.push(store.offset_for(cat, slot, group).unwrap());
            }
        }
        // No two (slot, group) pairs may alias, and every face slice must
        // stay inside the buffer without overlapping its neighbor.
        offsets.sort_unstable();
        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] >= dofs);
        }
        if let Some(&last) = offsets.last() {
            assert!(last + dofs <= len);
        }
    }
}

#[test]
fn split_chain_streams_agree_across_ranks() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0, 0, 1, 1], false).unwrap();
    let up = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
    let down = SweepOrdering::build(&grid, 1, PLUS_X).unwrap();
    let sender = FluxLinkageStore::build(&grid, &up, 2).unwrap();
    let receiver = FluxLinkageStore::build(&grid, &down, 2).unwrap();

    assert_eq!(sender.successor_ranks().collect::<Vec<_>>(), vec![1]);
    assert_eq!(receiver.predecessor_ranks().collect::<Vec<_>>(), vec![0]);

    // The cut face: cell 2's right face feeds cell 3's left face.
    assert_eq!(sender.successor_slot(CellId::new(2), 1), Ok((1, 0)));
    assert_eq!(receiver.predecessor_slot(CellId::new(3), 0), Ok((0, 0)));
    assert_eq!(sender.successor_buffer_len(1), Ok(2));
    assert_eq!(receiver.predecessor_buffer_len(0), Ok(2));

    // Both endpoints describe the stream with the same compact view.
    let sent = sender.successor_views(1).unwrap();
    let expected = receiver.compact_view_for(0, CellId::new(2)).unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0], expected);
    assert_eq!(expected.faces, vec![(0, vec![2])]);
}

#[test]
fn one_neighbor_cell_is_described_once() {
    // Rank 0 owns only the inflow corner; both of its outgoing faces feed
    // rank 1, so rank 1 must see a single view of that cell with two face
    // entries.
    let grid = quad_mesh(2, 2, &[0, 1, 1, 1]).unwrap();
    let diag = [1.0, 1.0, 0.0];
    let corner = SweepOrdering::build(&grid, 0, diag).unwrap();
    let rest = SweepOrdering::build(&grid, 1, diag).unwrap();
    let sender = FluxLinkageStore::build(&grid, &corner, 1).unwrap();
    let receiver = FluxLinkageStore::build(&grid, &rest, 1).unwrap();

    let sent = sender.successor_views(1).unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].cell, CellId::new(1));
    assert_eq!(sent[0].faces.len(), 2);
    // Slots are distinct and the vertex lists describe different faces.
    assert_ne!(sent[0].faces[0].0, sent[0].faces[1].0);
    assert_ne!(sent[0].faces[0].1, sent[0].faces[1].1);

    let seen = receiver.compact_view_for(0, CellId::new(1)).unwrap();
    assert_eq!(seen, &sent[0]);
}

#[test]
fn delayed_producers_claim_the_delayed_box() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0, 0, 1, 1], true).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
    assert_eq!(ordering.delayed(), &[CellId::new(1)]);
    let store = FluxLinkageStore::build(&grid, &ordering, 1).unwrap();

    // The delayed cell's outgoing transfer sits in the delayed box, not a
    // category lock box.
    assert_eq!(store.category_slots(0), Ok(0));
    assert_eq!(store.delayed_slots(), 1);
    assert_eq!(store.delayed_dofs(), 1);
    assert_eq!(store.delayed_outgoing_slot(CellId::new(1), 1), Ok(0));
    assert_eq!(store.delayed_incoming_slot(CellId::new(2), 0), Ok(0));
    assert_eq!(store.delayed_offset_for(0, 0), Ok(0));
    assert_eq!(store.delayed_buffer_len(), 1);

    // The wrap still exchanges with the other rank in both directions.
    assert_eq!(store.successor_ranks().collect::<Vec<_>>(), vec![1]);
    assert_eq!(store.predecessor_ranks().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn lookup_misses_are_reported() {
    let grid = segment_chain(&[0.0, 1.0, 2.0], &[0, 0], false).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
    let store = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();

    assert_eq!(
        store.offset_for(5, 0, 0),
        Err(SweepError::UnknownFaceCategory(5))
    );
    assert_eq!(
        store.offset_for(0, 9, 0),
        Err(SweepError::SlotOutOfRange {
            category: 0,
            slot: 9,
            max: 1
        })
    );
    assert_eq!(
        store.offset_for(0, 0, 2),
        Err(SweepError::GroupOutOfRange {
            group: 2,
            num_groups: 2
        })
    );
    assert_eq!(
        store.delayed_offset_for(0, 0),
        Err(SweepError::DelayedSlotOutOfRange { slot: 0, max: 0 })
    );
    assert_eq!(
        store.local_outgoing_slot(CellId::new(2), 1),
        Err(SweepError::SlotNotFound {
            cell: CellId::new(2),
            face: 1
        })
    );
    assert_eq!(
        store.compact_view_for(3, CellId::new(1)),
        Err(SweepError::UnknownNeighborRank(3))
    );
    assert_eq!(
        FluxLinkageStore::build(&grid, &ordering, 0).unwrap_err(),
        SweepError::ZeroGroups
    );
}

#[test]
fn rebuild_is_idempotent() {
    let grid = quad_mesh(3, 2, &[0, 0, 1, 0, 1, 1]).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, [1.0, 1.0, 0.0]).unwrap();
    let a = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();
    let b = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();
    for cat in 0..a.num_categories() {
        assert_eq!(a.category_slots(cat).unwrap(), b.category_slots(cat).unwrap());
        assert_eq!(a.buffer_len(cat).unwrap(), b.buffer_len(cat).unwrap());
    }
    assert_eq!(
        a.successor_ranks().collect::<Vec<_>>(),
        b.successor_ranks().collect::<Vec<_>>()
    );
    for rank in a.successor_ranks() {
        assert_eq!(a.successor_views(rank).unwrap(), b.successor_views(rank).unwrap());
    }
}

#[test]
fn buffers_connect_producer_to_consumer() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0], &[0, 0, 0], false).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
    let store = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();
    let mut buffers = FluxBuffers::allocate(&store).unwrap();

    for group in 0..2 {
        let out = buffers
            .outgoing_face_mut(&store, CellId::new(1), 1, group)
            .unwrap();
        out[0] = 10.0 + group as f64;
    }
    // Cell 2's upwind face reads exactly what cell 1 wrote.
    for group in 0..2 {
        let seen = buffers
            .upwind_face(&store, CellId::new(2), 0, group)
            .unwrap();
        assert_eq!(seen, &[10.0 + group as f64]);
    }
}

#[test]
fn delayed_buffers_connect_across_the_cycle_boundary() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0, 0, 1, 1], true).unwrap();
    let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
    let store = FluxLinkageStore::build(&grid, &ordering, 1).unwrap();
    let mut buffers = FluxBuffers::allocate(&store).unwrap();

    buffers
        .delayed_face_mut(&store, CellId::new(1), 1, 0)
        .unwrap()[0] = 3.25;
    assert_eq!(
        buffers
            .delayed_upwind_face(&store, CellId::new(2), 0, 0)
            .unwrap(),
        &[3.25]
    );
}
