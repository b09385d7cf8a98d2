//! Module grid sampling through a perspective transform anchored on the
//! finder centers and, from version 2 on, the bottom-right alignment pattern.
use crate::detector::grouping::FinderTriple;
use crate::models::{BitMatrix, Point, Version};
use crate::utils::geometry::PerspectiveTransform;

/// Alignment search radius in modules around the predicted center
const ALIGNMENT_SEARCH_MODULES: f32 = 4.0;
/// Worst acceptable template mismatch (out of 25 modules)
const MAX_ALIGNMENT_MISMATCH: usize = 4;
/// Modules at least this many pixels wide are read by 3x3 majority
const MAJORITY_MIN_MODULE: f32 = 4.0;

/// Sample a `dimension` x `dimension` module grid for the given finder triple
pub fn sample_grid(image: &BitMatrix, triple: &FinderTriple, dimension: usize) -> Option<BitMatrix> {
    let version = Version::from_size(dimension)?;
    let transform = grid_transform(image, triple, version)?;

    let pixel_module = module_pixels(triple, dimension);
    let mut grid = BitMatrix::square(dimension);
    for y in 0..dimension {
        for x in 0..dimension {
            let p = transform.transform(&Point::new(x as f32 + 0.5, y as f32 + 0.5))?;
            grid.set(x, y, read_module(image, p, pixel_module));
        }
    }
    Some(grid)
}

/// Module-space to image-space transform for one candidate version
fn grid_transform(image: &BitMatrix, triple: &FinderTriple, version: Version) -> Option<PerspectiveTransform> {
    let dim = version.size() as f32;
    let near = 3.5;
    let far = dim - 3.5;

    let (module_corner, image_corner) = match refine_alignment(image, triple, version) {
        Some(center) => (Point::new(dim - 6.5, dim - 6.5), center),
        None => (
            Point::new(far, far),
            Point::new(
                triple.top_right.x + triple.bottom_left.x - triple.top_left.x,
                triple.top_right.y + triple.bottom_left.y - triple.top_left.y,
            ),
        ),
    };

    let src = [
        Point::new(near, near),
        Point::new(far, near),
        module_corner,
        Point::new(near, far),
    ];
    let dst = [triple.top_left, triple.top_right, image_corner, triple.bottom_left];
    PerspectiveTransform::from_points(&src, &dst)
}

/// Locate the bottom-right alignment pattern near its predicted position.
///
/// Every pixel in the search window is scored against the 5x5 template;
/// the result is the centroid of all positions sharing the lowest score.
fn refine_alignment(image: &BitMatrix, triple: &FinderTriple, version: Version) -> Option<Point> {
    if version.number() < 2 {
        return None;
    }
    let span = version.size() as f32 - 7.0;
    let u = Point::new(
        (triple.top_right.x - triple.top_left.x) / span,
        (triple.top_right.y - triple.top_left.y) / span,
    );
    let v = Point::new(
        (triple.bottom_left.x - triple.top_left.x) / span,
        (triple.bottom_left.y - triple.top_left.y) / span,
    );
    // Alignment center sits 3 modules in from the far finder centers
    let offset = span - 3.0;
    let predicted = Point::new(
        triple.top_left.x + (u.x + v.x) * offset,
        triple.top_left.y + (u.y + v.y) * offset,
    );

    let radius = (ALIGNMENT_SEARCH_MODULES * triple.module_size).ceil() as isize;
    let (cx, cy) = (predicted.x.floor() as isize, predicted.y.floor() as isize);

    let mut best = usize::MAX;
    let mut sum = (0.0f32, 0.0f32);
    let mut hits = 0usize;
    for py in (cy - radius)..=(cy + radius) {
        for px in (cx - radius)..=(cx + radius) {
            if px < 0 || py < 0 {
                continue;
            }
            let candidate = Point::new(px as f32 + 0.5, py as f32 + 0.5);
            let mismatch = template_mismatch(image, candidate, u, v);
            if mismatch < best {
                best = mismatch;
                sum = (0.0, 0.0);
                hits = 0;
            }
            if mismatch == best {
                sum.0 += candidate.x;
                sum.1 += candidate.y;
                hits += 1;
            }
        }
    }

    (hits > 0 && best <= MAX_ALIGNMENT_MISMATCH)
        .then(|| Point::new(sum.0 / hits as f32, sum.1 / hits as f32))
}

/// Modules of the 5x5 alignment template that disagree with the image
fn template_mismatch(image: &BitMatrix, center: Point, u: Point, v: Point) -> usize {
    let mut mismatch = 0;
    for dy in -2i32..=2 {
        for dx in -2i32..=2 {
            let expected_dark = dx.abs().max(dy.abs()) != 1;
            let p = Point::new(
                center.x + u.x * dx as f32 + v.x * dy as f32,
                center.y + u.y * dx as f32 + v.y * dy as f32,
            );
            if pixel(image, p) != expected_dark {
                mismatch += 1;
            }
        }
    }
    mismatch
}

/// Module width in pixels implied by the finder spacing at this dimension
fn module_pixels(triple: &FinderTriple, dimension: usize) -> f32 {
    let span = dimension as f32 - 7.0;
    (triple.top_left.distance(&triple.top_right) + triple.top_left.distance(&triple.bottom_left))
        / (2.0 * span)
}

/// Dark test for one module centered at `p`
fn read_module(image: &BitMatrix, p: Point, module: f32) -> bool {
    if module < MAJORITY_MIN_MODULE {
        return pixel(image, p);
    }
    let mut dark = 0;
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if pixel(image, Point::new(p.x + dx as f32, p.y + dy as f32)) {
                dark += 1;
            }
        }
    }
    dark >= 5
}

/// Pixel containing a continuous coordinate; outside the image reads light
fn pixel(image: &BitMatrix, p: Point) -> bool {
    if p.x < 0.0 || p.y < 0.0 {
        return false;
    }
    image.get(p.x.floor() as usize, p.y.floor() as usize)
}
