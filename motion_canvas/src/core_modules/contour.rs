// THEORY:
// The `contour` module is the spatial grouping stage. It takes a binary motion mask
// and finds the outer boundary of every connected region in it, so the detector can
// pick the single dominant region and locate its center.
//
// Algorithm steps:
// 1.  **Seeding**: A raster scan finds the top-left pixel of each unvisited region.
//     Everything above it and to its left is background, which gives the boundary
//     tracer a known background neighbor to start from.
// 2.  **Boundary Tracing**: Moore-neighbor tracing walks the region's outer edge
//     clockwise, stopping when it is about to repeat its first step (Jacob's
//     criterion). Holes are never entered, so only external contours come out.
// 3.  **Region Marking**: An 8-connected flood fill marks the whole region visited
//     so its interior pixels never seed a second contour.
// 4.  **Geometry**: Area and raw moments come from the traced polygon via Green's
//     theorem. A polygon with no enclosed area (a line, a single pixel) has a zero
//     zeroth moment and therefore no centroid.
//
// Like the rest of the spatial layer, this is stateless: one mask in, contours out.

use image::GrayImage;

use crate::core_modules::morphology::MASK_OFF;

/// Clockwise on screen (y grows downward), starting west.
const NEIGHBORS: [(i32, i32); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// A pixel coordinate on the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn step(self, direction: usize) -> Point {
        let (dx, dy) = NEIGHBORS[direction];
        Point::new(self.x + dx, self.y + dy)
    }

    fn direction_to(self, other: Point) -> usize {
        let offset = (other.x - self.x, other.y - self.y);
        NEIGHBORS.iter().position(|&n| n == offset).unwrap_or(0)
    }
}

/// Zeroth and first raw moments of a contour polygon.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl RawMoments {
    /// The centroid `(m10 / m00, m01 / m00)`, or `None` for a degenerate contour.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 == 0.0 {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// The ordered outer boundary of one connected mask region.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    /// Raw moments of the polygon through the boundary pixel centers, oriented so
    /// that `m00` is the non-negative enclosed area.
    pub fn moments(&self) -> RawMoments {
        let count = self.points.len();
        if count < 3 {
            return RawMoments::default();
        }

        let mut moments = RawMoments::default();
        for i in 0..count {
            let a = self.points[i];
            let b = self.points[(i + 1) % count];
            let (xa, ya, xb, yb) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            let cross = xa * yb - xb * ya;
            moments.m00 += cross;
            moments.m10 += (xa + xb) * cross;
            moments.m01 += (ya + yb) * cross;
        }
        moments.m00 /= 2.0;
        moments.m10 /= 6.0;
        moments.m01 /= 6.0;

        if moments.m00 < 0.0 {
            moments.m00 = -moments.m00;
            moments.m10 = -moments.m10;
            moments.m01 = -moments.m01;
        }
        moments
    }

    pub fn area(&self) -> f64 {
        self.moments().m00
    }
}

#[inline]
fn is_on(mask: &GrayImage, point: Point) -> bool {
    point.x >= 0
        && point.y >= 0
        && (point.x as u32) < mask.width()
        && (point.y as u32) < mask.height()
        && mask.get_pixel(point.x as u32, point.y as u32).0[0] != MASK_OFF
}

/// Finds the outer boundary of every 8-connected region in `mask`.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let (width, height) = mask.dimensions();
    let mut visited = vec![false; (width * height) as usize];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let index = (y * width + x) as usize;
            if visited[index] || mask.get_pixel(x, y).0[0] == MASK_OFF {
                continue;
            }

            let seed = Point::new(x as i32, y as i32);
            contours.push(Contour {
                points: trace_boundary(mask, seed),
            });
            mark_region(mask, seed, &mut visited);
        }
    }

    contours
}

/// The contour enclosing the largest area, if any.
pub fn largest_contour(contours: &[Contour]) -> Option<(&Contour, f64)> {
    contours
        .iter()
        .map(|contour| (contour, contour.area()))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Moore-neighbor tracing from a seed whose west neighbor is background.
fn trace_boundary(mask: &GrayImage, start: Point) -> Vec<Point> {
    let mut points = vec![start];
    let mut current = start;
    let mut backtrack = 0usize;
    let max_steps = 4 * (mask.width() as usize * mask.height() as usize) + 8;

    for _ in 0..max_steps {
        let Some((direction, next)) = (1..=8)
            .map(|k| (backtrack + k) % 8)
            .map(|direction| (direction, current.step(direction)))
            .find(|&(_, candidate)| is_on(mask, candidate))
        else {
            // Isolated pixel.
            break;
        };

        if current == start && points.len() > 1 && next == points[1] {
            // The closing return to `start` repeats the first point.
            if points.len() > 2 && points.last() == Some(&start) {
                points.pop();
            }
            break;
        }

        // The neighbor checked just before `next` is background and becomes the
        // next backtrack position.
        let previous = current.step((direction + 7) % 8);
        backtrack = next.direction_to(previous);

        // `start` is recorded again when the boundary passes through it mid-trace.
        points.push(next);
        current = next;
    }

    points
}

fn mark_region(mask: &GrayImage, seed: Point, visited: &mut [bool]) {
    let width = mask.width() as usize;
    let mut to_fill = vec![seed];
    visited[seed.y as usize * width + seed.x as usize] = true;

    while let Some(point) = to_fill.pop() {
        for direction in 0..NEIGHBORS.len() {
            let neighbor = point.step(direction);
            if !is_on(mask, neighbor) {
                continue;
            }
            let index = neighbor.y as usize * width + neighbor.x as usize;
            if !visited[index] {
                visited[index] = true;
                to_fill.push(neighbor);
            }
        }
    }
}
