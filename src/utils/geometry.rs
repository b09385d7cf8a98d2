/// Perspective mapping between module space and image space
use crate::models::Point;

/// Projective transform `(x, y) -> ((a*x + b*y + c) / w, (d*x + e*y + f) / w)`
/// with `w = g*x + h*y + 1`. Coefficients are kept in f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveTransform {
    coeffs: [f64; 8],
}

impl PerspectiveTransform {
    /// Solve the transform that maps each `src[i]` onto `dst[i]`.
    ///
    /// Returns `None` for degenerate (collinear) point sets.
    pub fn from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];

        for i in 0..4 {
            let (sx, sy) = (src[i].x as f64, src[i].y as f64);
            let (dx, dy) = (dst[i].x as f64, dst[i].y as f64);

            let row = i * 2;
            a[row] = [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy];
            b[row] = dx;
            a[row + 1] = [0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy];
            b[row + 1] = dy;
        }

        let coeffs = solve_linear_system(a, b)?;
        coeffs
            .iter()
            .all(|c| c.is_finite())
            .then_some(Self { coeffs })
    }

    /// Map a point; `None` when it lands on the line at infinity
    pub fn transform(&self, p: &Point) -> Option<Point> {
        let (x, y) = (p.x as f64, p.y as f64);
        let [a, b, c, d, e, f, g, h] = self.coeffs;

        let w = g * x + h * y + 1.0;
        if w.abs() < 1e-12 {
            return None;
        }
        let mapped = Point::new(((a * x + b * y + c) / w) as f32, ((d * x + e * y + f) / w) as f32);
        mapped.is_finite().then_some(mapped)
    }
}

/// Gaussian elimination with partial pivoting
#[allow(clippy::needless_range_loop)]
fn solve_linear_system(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Option<[f64; 8]> {
    let n = 8;

    for i in 0..n {
        let mut max_row = i;
        for k in (i + 1)..n {
            if a[k][i].abs() > a[max_row][i].abs() {
                max_row = k;
            }
        }
        if a[max_row][i].abs() < 1e-12 {
            return None;
        }
        a.swap(i, max_row);
        b.swap(i, max_row);

        for k in (i + 1)..n {
            let factor = a[k][i] / a[i][i];
            b[k] -= factor * b[i];
            for j in i..n {
                a[k][j] -= factor * a[i][j];
            }
        }
    }

    let mut x = [0.0f64; 8];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }

    Some(x)
}

/// Signed z component of (b - a) x (c - a); positive when a, b, c turn clockwise in image coordinates
pub fn cross_product_z(a: &Point, b: &Point, c: &Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}
