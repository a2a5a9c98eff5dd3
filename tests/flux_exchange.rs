use mesh_sweep::comm::ThreadComm;
use mesh_sweep::mesh::build::segment_chain;
use mesh_sweep::mesh::id::CellId;
use mesh_sweep::sweep::buffers::FluxBuffers;
use mesh_sweep::sweep::exchange::{exchange_cell_views, exchange_flux};
use mesh_sweep::sweep::fluds::FluxLinkageStore;
use mesh_sweep::sweep::spds::SweepOrdering;
use serial_test::serial;

const PLUS_X: [f64; 3] = [1.0, 0.0, 0.0];

#[test]
#[serial]
fn flux_crosses_the_partition_cut() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0, 0, 1, 1], false).unwrap();

    std::thread::scope(|scope| {
        let upstream = scope.spawn(|| {
            let comm = ThreadComm::new(0, 2);
            let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
            let store = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();
            let mut buffers = FluxBuffers::allocate(&store).unwrap();
            for group in 0..2 {
                buffers
                    .send_face_mut(&store, CellId::new(2), 1, group)
                    .unwrap()[0] = 5.0 + group as f64;
            }
            exchange_flux(&comm, &store, &mut buffers, 40).unwrap();
        });

        let downstream = scope.spawn(|| {
            let comm = ThreadComm::new(1, 2);
            let ordering = SweepOrdering::build(&grid, 1, PLUS_X).unwrap();
            let store = FluxLinkageStore::build(&grid, &ordering, 2).unwrap();
            let mut buffers = FluxBuffers::allocate(&store).unwrap();
            exchange_flux(&comm, &store, &mut buffers, 40).unwrap();
            for group in 0..2 {
                let seen = buffers
                    .recv_face(&store, CellId::new(3), 0, group)
                    .unwrap();
                assert_eq!(seen, &[5.0 + group as f64]);
            }
        });

        upstream.join().unwrap();
        downstream.join().unwrap();
    });
}

#[test]
#[serial]
fn view_handshake_matches_local_derivation() {
    let grid = segment_chain(&[0.0, 1.0, 2.0, 3.0, 4.0], &[0, 0, 1, 1], false).unwrap();

    std::thread::scope(|scope| {
        let upstream = scope.spawn(|| {
            let comm = ThreadComm::new(0, 2);
            let ordering = SweepOrdering::build(&grid, 0, PLUS_X).unwrap();
            let store = FluxLinkageStore::build(&grid, &ordering, 1).unwrap();
            let received = exchange_cell_views(&comm, &store, 50).unwrap();
            // The upstream rank waits on nobody.
            assert!(received.is_empty());
        });

        let downstream = scope.spawn(|| {
            let comm = ThreadComm::new(1, 2);
            let ordering = SweepOrdering::build(&grid, 1, PLUS_X).unwrap();
            let store = FluxLinkageStore::build(&grid, &ordering, 1).unwrap();
            let received = exchange_cell_views(&comm, &store, 50).unwrap();
            let views = &received[&0];
            assert_eq!(views.len(), 1);
            // What the sender announced is exactly what this rank derived
            // from the replicated grid.
            let local = store.compact_view_for(0, views[0].cell).unwrap();
            assert_eq!(&views[0], local);
        });

        upstream.join().unwrap();
        downstream.join().unwrap();
    });
}
