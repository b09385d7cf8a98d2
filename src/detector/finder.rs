/// Finder pattern detection: 1:1:3:1:1 row scan confirmed by vertical and
/// horizontal cross-checks, with repeated hits merged into weighted centers.
use crate::models::{BitMatrix, Point};

/// Allowed deviation of each run from its ideal length, in modules
const MAX_VARIANCE: f32 = 0.5;

/// A confirmed finder pattern center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub center: Point,
    pub module_size: f32,
    /// Number of scan rows that confirmed this pattern
    pub count: usize,
}

impl FinderPattern {
    pub fn new(x: f32, y: f32, module_size: f32) -> Self {
        Self {
            center: Point::new(x, y),
            module_size,
            count: 1,
        }
    }

    fn about_equals(&self, other: &FinderPattern) -> bool {
        let close = (other.center.x - self.center.x).abs() <= other.module_size
            && (other.center.y - self.center.y).abs() <= other.module_size;
        let size_diff = (other.module_size - self.module_size).abs();
        close && (size_diff <= 1.0 || size_diff <= self.module_size)
    }

    fn combine(&mut self, other: &FinderPattern) {
        let n = self.count as f32;
        let total = n + other.count as f32;
        self.center.x = (self.center.x * n + other.center.x * other.count as f32) / total;
        self.center.y = (self.center.y * n + other.center.y * other.count as f32) / total;
        self.module_size = (self.module_size * n + other.module_size * other.count as f32) / total;
        self.count += other.count;
    }
}

pub struct FinderDetector;

impl FinderDetector {
    /// Scan every row of a binarized image for finder patterns
    pub fn detect(matrix: &BitMatrix) -> Vec<FinderPattern> {
        let width = matrix.width();
        let mut found: Vec<FinderPattern> = Vec::new();

        for y in 0..matrix.height() {
            let mut counts = [0usize; 5];
            let mut state = 0usize;

            for x in 0..width {
                if matrix.get(x, y) {
                    if state % 2 == 1 {
                        state += 1;
                    }
                    counts[state] += 1;
                } else if state % 2 == 1 {
                    counts[state] += 1;
                } else if state == 0 && counts[0] == 0 {
                    // Light run before the first dark pixel
                    continue;
                } else if state < 4 {
                    state += 1;
                    counts[state] += 1;
                } else {
                    if let Some(pattern) = Self::confirm(matrix, &counts, x, y) {
                        Self::merge(&mut found, pattern);
                        counts = [0; 5];
                        state = 0;
                        continue;
                    }
                    counts = [counts[2], counts[3], counts[4], 1, 0];
                    state = 3;
                }
            }

            if state == 4 {
                if let Some(pattern) = Self::confirm(matrix, &counts, width, y) {
                    Self::merge(&mut found, pattern);
                }
            }
        }

        found
    }

    fn merge(found: &mut Vec<FinderPattern>, pattern: FinderPattern) {
        match found.iter_mut().find(|p| p.about_equals(&pattern)) {
            Some(existing) => existing.combine(&pattern),
            None => found.push(pattern),
        }
    }

    /// Check the run ratios and cross-check a row candidate ending at `end_x`
    fn confirm(matrix: &BitMatrix, counts: &[usize; 5], end_x: usize, y: usize) -> Option<FinderPattern> {
        if !ratio_matches(counts) {
            return None;
        }
        let row_total: usize = counts.iter().sum();
        let center_x = center_from_end(counts, end_x);

        let (center_y, col_total) =
            Self::cross_check(matrix, center_x as usize, y, counts[2], row_total, Axis::Vertical)?;
        let (center_x, row_total) = Self::cross_check(
            matrix,
            center_x as usize,
            center_y as usize,
            counts[2],
            row_total,
            Axis::Horizontal,
        )?;

        let module_size = (row_total + col_total) as f32 / 14.0;
        Some(FinderPattern::new(center_x, center_y, module_size))
    }

    /// Re-measure the 1:1:3:1:1 runs along one axis through `(x, y)`.
    /// Returns the center coordinate along that axis and the total run length.
    fn cross_check(
        matrix: &BitMatrix,
        x: usize,
        y: usize,
        max_count: usize,
        original_total: usize,
        axis: Axis,
    ) -> Option<(f32, usize)> {
        let (start, limit) = match axis {
            Axis::Vertical => (y, matrix.height()),
            Axis::Horizontal => (x, matrix.width()),
        };
        let dark = |i: usize| match axis {
            Axis::Vertical => matrix.get(x, i),
            Axis::Horizontal => matrix.get(i, y),
        };
        if start >= limit || !dark(start) {
            return None;
        }

        let mut counts = [0usize; 5];

        // Toward lower coordinates
        let mut i = start as isize;
        while i >= 0 && dark(i as usize) {
            counts[2] += 1;
            i -= 1;
        }
        if i < 0 {
            return None;
        }
        while i >= 0 && !dark(i as usize) && counts[1] <= max_count {
            counts[1] += 1;
            i -= 1;
        }
        if i < 0 || counts[1] > max_count {
            return None;
        }
        while i >= 0 && dark(i as usize) && counts[0] <= max_count {
            counts[0] += 1;
            i -= 1;
        }
        if counts[0] > max_count {
            return None;
        }

        // Toward higher coordinates
        let mut j = start + 1;
        while j < limit && dark(j) {
            counts[2] += 1;
            j += 1;
        }
        if j == limit {
            return None;
        }
        while j < limit && !dark(j) && counts[3] < max_count {
            counts[3] += 1;
            j += 1;
        }
        if j == limit || counts[3] >= max_count {
            return None;
        }
        while j < limit && dark(j) && counts[4] < max_count {
            counts[4] += 1;
            j += 1;
        }
        if counts[4] >= max_count {
            return None;
        }

        let total: usize = counts.iter().sum();
        if 5 * total.abs_diff(original_total) >= 2 * original_total {
            return None;
        }
        ratio_matches(&counts).then(|| (center_from_end(&counts, j), total))
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Vertical,
    Horizontal,
}

/// Whether five runs look like dark-light-dark-light-dark in 1:1:3:1:1
pub(crate) fn ratio_matches(counts: &[usize; 5]) -> bool {
    if counts.contains(&0) {
        return false;
    }
    let total: usize = counts.iter().sum();
    if total < 7 {
        return false;
    }
    let module = total as f32 / 7.0;
    let max_variance = module * MAX_VARIANCE;
    let expected = [1.0, 1.0, 3.0, 1.0, 1.0];
    counts
        .iter()
        .zip(expected)
        .all(|(&c, e)| (module * e - c as f32).abs() < max_variance * e)
}

/// Center of the middle run, given the coordinate just past the last run
fn center_from_end(counts: &[usize; 5], end: usize) -> f32 {
    end as f32 - counts[4] as f32 - counts[3] as f32 - counts[2] as f32 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 7x7 finder pattern drawn at module offset (mx, my)
    fn draw_finder(matrix: &mut BitMatrix, mx: usize, my: usize, scale: usize) {
        for dy in 0..7 {
            for dx in 0..7 {
                let ring = dx.min(dy).min(6 - dx).min(6 - dy);
                if ring != 1 {
                    for py in 0..scale {
                        for px in 0..scale {
                            matrix.set((mx + dx) * scale + px, (my + dy) * scale + py, true);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_pattern_center() {
        let scale = 4;
        let mut matrix = BitMatrix::new(15 * scale, 15 * scale);
        draw_finder(&mut matrix, 4, 4, scale);

        let patterns = FinderDetector::detect(&matrix);
        assert_eq!(patterns.len(), 1);
        let p = patterns[0];
        assert!((p.center.x - 7.5 * scale as f32).abs() < 0.75);
        assert!((p.center.y - 7.5 * scale as f32).abs() < 0.75);
        assert!((p.module_size - scale as f32).abs() < 0.5);
        assert!(p.count >= 3);
    }

    #[test]
    fn test_three_patterns() {
        let scale = 3;
        let mut matrix = BitMatrix::new(40 * scale, 40 * scale);
        draw_finder(&mut matrix, 2, 2, scale);
        draw_finder(&mut matrix, 25, 2, scale);
        draw_finder(&mut matrix, 2, 25, scale);

        let patterns = FinderDetector::detect(&matrix);
        assert_eq!(patterns.len(), 3);
    }

    #[test]
    fn test_row_only_pattern_rejected() {
        // A 1:1:3:1:1 row with nothing above or below fails the vertical check
        let mut matrix = BitMatrix::new(25, 10);
        let y = 5;
        for x in (2..5).chain(8..17).chain(20..23) {
            matrix.set(x, y, true);
        }
        assert!(FinderDetector::detect(&matrix).is_empty());
    }

    #[test]
    fn test_ratio_matches() {
        assert!(ratio_matches(&[3, 3, 9, 3, 3]));
        assert!(ratio_matches(&[2, 3, 8, 3, 3]));
        assert!(!ratio_matches(&[3, 3, 3, 3, 3]));
        assert!(!ratio_matches(&[1, 0, 3, 1, 1]));
    }
}
