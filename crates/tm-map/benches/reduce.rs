use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tm_core::Point2d;
use tm_map::{CRUFT_MERGE_EDGES, CRUFT_MERGE_FACES, CRUFT_REMOVE_BRIDGES, PlanarMap};

/// Regular grid of `cols` x `rows` nodes with unit-spaced axis-aligned
/// edges, giving (cols-1)*(rows-1) finite faces.
fn grid_map(cols: usize, rows: usize) -> PlanarMap {
    let spacing = 8.0;
    let mut map = PlanarMap::new((cols * 8 + 8, rows * 8 + 8));

    let mut nodes = vec![vec![0; cols]; rows];
    for (j, row) in nodes.iter_mut().enumerate() {
        for (i, slot) in row.iter_mut().enumerate() {
            *slot = map.add_node(Point2d::new(i as f64 * spacing + 4.0, j as f64 * spacing + 4.0));
        }
    }

    for j in 0..rows {
        for i in 0..cols {
            let a = nodes[j][i];
            let pa = map.node(a).expect("fresh node").position();
            if i + 1 < cols {
                let b = nodes[j][i + 1];
                let pb = map.node(b).expect("fresh node").position();
                map.add_edge(a, b, vec![pa, pb], None).expect("grid edge");
            }
            if j + 1 < rows {
                let b = nodes[j + 1][i];
                let pb = map.node(b).expect("fresh node").position();
                map.add_edge(a, b, vec![pa, pb], None).expect("grid edge");
            }
        }
    }

    map
}

fn built_grid(cols: usize, rows: usize) -> PlanarMap {
    let mut map = grid_map(cols, rows);
    map.sort_edges_directly().expect("sortable");
    map.init_contours().expect("fresh map");
    map.embed_faces(false).expect("embeddable");
    map
}

fn bench_construction(c: &mut Criterion) {
    c.bench_function("planar_map_build_grid_40x30", |b| {
        b.iter(|| {
            let mut map = grid_map(40, 30);
            map.sort_edges_directly().expect("sortable");
            map.init_contours().expect("fresh map");
            map.embed_faces(false).expect("embeddable");
            black_box((map.node_count(), map.edge_count(), map.face_count()));
        });
    });
}

fn bench_reduction(c: &mut Criterion) {
    let built = built_grid(40, 30);

    c.bench_function("planar_map_reduce_grid_40x30", |b| {
        b.iter(|| {
            let mut map = built.clone();
            map.remove_cruft(CRUFT_MERGE_FACES | CRUFT_REMOVE_BRIDGES | CRUFT_MERGE_EDGES)
                .expect("reducible");
            black_box(map.face_count());
        });
    });
}

criterion_group!(benches, bench_construction, bench_reduction);
criterion_main!(benches);
