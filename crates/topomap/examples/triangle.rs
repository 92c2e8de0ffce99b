//! Builds a triangle map, edits it through a pyramid and walks the
//! levels back down.

use topomap::{MapPyramid, PlanarMap, Point2d};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut map = PlanarMap::new((16, 16));
    let a = map.add_node(Point2d::new(0.0, 0.0));
    let b = map.add_node(Point2d::new(10.0, 0.0));
    let c = map.add_node(Point2d::new(5.0, 8.0));
    map.add_edge(a, b, vec![Point2d::new(0.0, 0.0), Point2d::new(10.0, 0.0)], None)?;
    map.add_edge(b, c, vec![Point2d::new(10.0, 0.0), Point2d::new(5.0, 8.0)], None)?;
    map.add_edge(c, a, vec![Point2d::new(5.0, 8.0), Point2d::new(0.0, 0.0)], None)?;

    map.sort_edges_directly()?;
    map.init_contours()?;
    map.embed_faces(true)?;
    println!(
        "built: {} nodes, {} edges, {} faces (consistent: {})",
        map.node_count(),
        map.edge_count(),
        map.face_count(),
        map.check_consistency()
    );

    let mut pyramid = MapPyramid::new(map);
    pyramid.merge_faces(1)?;
    pyramid.remove_edge(2)?;
    pyramid.remove_edge_with_ends(3)?;

    for index in 0..pyramid.level_count() {
        let level = pyramid.get_level(index)?;
        println!(
            "level {index}: {} nodes, {} edges, {} faces",
            level.map().node_count(),
            level.map().edge_count(),
            level.map().face_count()
        );
    }

    let point = Point2d::new(5.0, 3.0);
    let base = pyramid.get_level(0)?;
    println!(
        "face at {:?}: level 0 -> {}, top -> {}",
        (point.x, point.y),
        base.map().face_at(point)?,
        pyramid.top_level().map().face_at(point)?
    );
    Ok(())
}
