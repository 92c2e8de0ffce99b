use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tm_core::Point2d;
use tm_map::PlanarMap;
use tm_pyr::MapPyramid;

/// Grid of `cols` x `rows` nodes with axis-aligned edges.
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

    map.sort_edges_directly().expect("sortable");
    map.init_contours().expect("fresh map");
    map.embed_faces(false).expect("embeddable");
    map
}

/// Pyramid that merges every mergeable edge of the grid, one level each.
fn reduced_pyramid(cols: usize, rows: usize) -> MapPyramid {
    let mut pyramid = MapPyramid::new(grid_map(cols, rows));
    loop {
        let next = pyramid
            .top_level()
            .map()
            .edges()
            .find(|e| !e.is_bridge())
            .map(|e| e.dart_label());
        let Some(dart) = next else { break };
        pyramid.merge_faces(dart).expect("not a bridge");
    }
    pyramid
}

fn bench_navigation(c: &mut Criterion) {
    let pyramid = reduced_pyramid(16, 12);
    let levels = pyramid.level_count();

    c.bench_function("pyramid_get_mid_level", |b| {
        b.iter(|| {
            let level = pyramid.get_level(black_box(levels / 2)).expect("in range");
            black_box(level.map().face_count());
        });
    });

    c.bench_function("pyramid_sweep_down_and_up", |b| {
        b.iter(|| {
            let mut level = pyramid.get_level(levels - 1).expect("top copy");
            pyramid.goto_level(&mut level, 0).expect("navigable");
            pyramid.goto_level(&mut level, levels - 1).expect("navigable");
            black_box(level.index());
        });
    });
}

criterion_group!(benches, bench_navigation);
criterion_main!(benches);
