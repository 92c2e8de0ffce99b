use tm_core::{Image, Point2d, Polygon};

use crate::map::pixel_of;

/// Scanline fill of a closed polygon at pixel centers (even-odd rule).
/// Every covered pixel is overwritten with `value`; returns the number of
/// pixels written.
pub(crate) fn fill_polygon(img: &mut Image<i32>, poly: &Polygon, value: i32) -> i64 {
    let points = poly.points();
    if points.len() < 3 || img.width() == 0 || img.height() == 0 {
        return 0;
    }

    let bbox = poly.bounding_box();
    let y_start = (bbox.min.y.ceil().max(0.0)) as i64;
    let y_end = (bbox.max.y.floor().min(img.height() as f64 - 1.0)) as i64;
    let width = img.width() as i64;

    let mut filled = 0_i64;
    let mut crossings: Vec<f64> = Vec::new();
    for y in y_start..=y_end {
        let yf = y as f64;
        crossings.clear();
        let n = points.len();
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            // half-open span so shared vertices count once
            if (a.y <= yf && b.y > yf) || (b.y <= yf && a.y > yf) {
                crossings.push(a.x + (yf - a.y) / (b.y - a.y) * (b.x - a.x));
            }
        }
        crossings.sort_by(|u, v| u.total_cmp(v));
        for pair in crossings.chunks_exact(2) {
            let x_begin = (pair[0].ceil().max(0.0)) as i64;
            let x_end = (pair[1].ceil().min(width as f64)) as i64;
            for x in x_begin..x_end {
                *img.get_mut(x as usize, y as usize).expect("clipped to image") = value;
                filled += 1;
            }
        }
    }
    filled
}

/// Grid pixels covered by a polyline, each at most once, in row-major
/// order. Pixels outside the image are included; callers clip.
pub(crate) fn polyline_pixels(points: &[Point2d]) -> Vec<(i64, i64)> {
    let mut pixels = Vec::new();
    for w in points.windows(2) {
        segment_pixels(w[0], w[1], &mut pixels);
    }
    pixels.sort_unstable_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
    pixels.dedup();
    pixels
}

/// Pixel-box traversal of one segment (pixel centers at integer
/// coordinates, box boundaries at half-integers).
fn segment_pixels(a: Point2d, b: Point2d, out: &mut Vec<(i64, i64)>) {
    let (mut x, mut y) = pixel_of(a);
    let (xe, ye) = pixel_of(b);
    out.push((x, y));

    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let step_x: i64 = if dx >= 0.0 { 1 } else { -1 };
    let step_y: i64 = if dy >= 0.0 { 1 } else { -1 };

    let mut t_max_x = if dx != 0.0 {
        ((x as f64 + 0.5 * step_x as f64) - a.x) / dx
    } else {
        f64::INFINITY
    };
    let mut t_max_y = if dy != 0.0 {
        ((y as f64 + 0.5 * step_y as f64) - a.y) / dy
    } else {
        f64::INFINITY
    };
    let t_delta_x = if dx != 0.0 { (1.0 / dx).abs() } else { f64::INFINITY };
    let t_delta_y = if dy != 0.0 { (1.0 / dy).abs() } else { f64::INFINITY };

    let mut remaining = (xe - x).abs() + (ye - y).abs();
    while (x, y) != (xe, ye) && remaining > 0 {
        if t_max_x < t_max_y {
            x += step_x;
            t_max_x += t_delta_x;
        } else {
            y += step_y;
            t_max_y += t_delta_y;
        }
        out.push((x, y));
        remaining -= 1;
    }
    if (x, y) != (xe, ye) {
        out.push((xe, ye));
    }
}

/// Marks the pixels as covered by one more edge rasterization:
/// `v < 0` counts coverings, face labels and uncovered pixels become −1.
pub(crate) fn add_edge_coverage(img: &mut Image<i32>, pixels: &[(i64, i64)]) {
    for &(x, y) in pixels {
        if !img.is_inside(x, y) {
            continue;
        }
        let v = img.get_mut(x as usize, y as usize).expect("bounds checked");
        *v = if *v < 0 { *v - 1 } else { -1 };
    }
}

/// Takes one covering off the pixels. Pixels whose last covering goes
/// away receive `substitute` and are reported in `reclaimed`.
pub(crate) fn remove_edge_coverage(
    img: &mut Image<i32>,
    pixels: &[(i64, i64)],
    substitute: i32,
    reclaimed: &mut Vec<(usize, usize)>,
) {
    for &(x, y) in pixels {
        if !img.is_inside(x, y) {
            continue;
        }
        let v = img.get_mut(x as usize, y as usize).expect("bounds checked");
        if *v < -1 {
            *v += 1;
        } else if *v == -1 {
            *v = substitute;
            reclaimed.push((x as usize, y as usize));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    #[test]
    fn fill_square_counts_pixels() {
        let mut img = Image::new_fill(8, 8, 0);
        let poly = Polygon::from(vec![
            p(1.0, 1.0),
            p(5.0, 1.0),
            p(5.0, 5.0),
            p(1.0, 5.0),
        ]);
        let filled = fill_polygon(&mut img, &poly, 3);
        assert_eq!(filled, 16); // 4x4 pixel centers strictly inside + lower/left boundary
        assert_eq!(img.get(1, 1), Some(&3));
        assert_eq!(img.get(4, 4), Some(&3));
        assert_eq!(img.get(5, 5), Some(&0));
        assert_eq!(img.get(0, 0), Some(&0));
    }

    #[test]
    fn fill_clips_to_image() {
        let mut img = Image::new_fill(4, 4, 0);
        let poly = Polygon::from(vec![
            p(-2.0, -2.0),
            p(10.0, -2.0),
            p(10.0, 10.0),
            p(-2.0, 10.0),
        ]);
        let filled = fill_polygon(&mut img, &poly, 1);
        assert_eq!(filled, 16);
        assert!(img.data().iter().all(|&v| v == 1));
    }

    #[test]
    fn polyline_pixels_connects_endpoints() {
        let px = polyline_pixels(&[p(0.0, 0.0), p(3.0, 0.0), p(3.0, 2.0)]);
        assert!(px.contains(&(0, 0)));
        assert!(px.contains(&(3, 0)));
        assert!(px.contains(&(3, 2)));
        assert_eq!(px.len(), 6); // no duplicate at the corner
        // each consecutive pair of a single segment is 4-connected
        let seg = polyline_pixels(&[p(0.0, 0.0), p(5.0, 3.0)]);
        assert!(seg.len() >= 6);
    }

    #[test]
    fn coverage_counting_roundtrip() {
        let mut img = Image::new_fill(4, 1, 0);
        *img.get_mut(1, 0).expect("in range") = 7; // face label
        let pixels = [(0, 0), (1, 0), (2, 0)];
        add_edge_coverage(&mut img, &pixels);
        assert_eq!(img.data(), &[-1, -1, -1, 0]);
        add_edge_coverage(&mut img, &pixels[1..]);
        assert_eq!(img.data(), &[-1, -2, -2, 0]);

        let mut reclaimed = Vec::new();
        remove_edge_coverage(&mut img, &pixels, 9, &mut reclaimed);
        assert_eq!(img.data(), &[9, -1, -1, 0]);
        assert_eq!(reclaimed, vec![(0, 0)]);

        reclaimed.clear();
        remove_edge_coverage(&mut img, &pixels[1..], 9, &mut reclaimed);
        assert_eq!(img.data(), &[9, 9, 9, 0]);
        assert_eq!(reclaimed, vec![(1, 0), (2, 0)]);
    }
}
