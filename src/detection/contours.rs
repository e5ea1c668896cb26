use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use crate::models::Contour;

/// Trace the outermost borders of the foreground (non-zero) blobs in a binary mask.
///
/// Borders nested inside holes are skipped, as are the holes themselves.
/// Contours come back in the order the raster scan first touches each blob.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        .map(|c| Contour::new(simplify_chain(c.points)))
        .collect()
}

/// Drop interior points of straight horizontal, vertical and diagonal runs,
/// keeping only the points where the boundary changes direction
fn simplify_chain(points: Vec<Point<i32>>) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points;
    }

    let direction = |a: Point<i32>, b: Point<i32>| {
        ((b.x - a.x).signum(), (b.y - a.y).signum())
    };

    points
        .iter()
        .enumerate()
        .filter(|&(i, p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            direction(prev, *p) != direction(*p, next)
        })
        .map(|(_, p)| *p)
        .collect()
}
