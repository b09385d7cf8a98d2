/// Grouping of finder patterns into top-left / top-right / bottom-left triples
use super::finder::FinderPattern;
use crate::models::{Point, Version};
use crate::utils::geometry::cross_product_z;

/// Only the strongest candidates are combined (n choose 3 grows fast)
const MAX_CANDIDATES: usize = 12;
/// Largest module size spread inside one symbol
const MAX_MODULE_RATIO: f32 = 1.7;
/// Largest ratio between the two legs at the top-left corner
const MAX_LEG_RATIO: f32 = 1.6;
/// |cos| of the top-left angle; 0 is a perfect right angle
const MAX_CORNER_COS: f32 = 0.35;

/// Three finder patterns ordered as they sit on an upright symbol
#[derive(Debug, Clone, PartialEq)]
pub struct FinderTriple {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    /// Module size measured from the finder pattern runs
    pub module_size: f32,
    /// Estimated symbol width in modules (always 17 + 4v)
    pub dimension: usize,
    /// Indices into the pattern list this triple was built from
    pub indices: [usize; 3],
    /// Lower is better
    pub score: f32,
}

impl FinderTriple {
    /// Estimated dimension first, then its neighbours
    pub fn dimension_candidates(&self) -> Vec<usize> {
        let mut dims = vec![self.dimension];
        for delta in [4isize, -4] {
            let dim = self.dimension as isize + delta;
            if dim >= 21 && Version::from_size(dim as usize).is_some() {
                dims.push(dim as usize);
            }
        }
        dims
    }
}

/// Every plausible triple, best first
pub fn group_finder_patterns(patterns: &[FinderPattern]) -> Vec<FinderTriple> {
    if patterns.len() < 3 {
        return Vec::new();
    }

    let mut ranked: Vec<usize> = (0..patterns.len()).collect();
    ranked.sort_by(|&a, &b| patterns[b].count.cmp(&patterns[a].count));
    ranked.truncate(MAX_CANDIDATES);

    let mut triples = Vec::new();
    for (n, &i) in ranked.iter().enumerate() {
        for (m, &j) in ranked.iter().enumerate().skip(n + 1) {
            for &k in ranked.iter().skip(m + 1) {
                if let Some(triple) = order_finder_patterns(patterns, [i, j, k]) {
                    triples.push(triple);
                }
            }
        }
    }

    triples.sort_by(|a, b| a.score.total_cmp(&b.score));
    triples
}

/// Put three patterns in symbol order and check they form a plausible corner set
pub fn order_finder_patterns(patterns: &[FinderPattern], indices: [usize; 3]) -> Option<FinderTriple> {
    let p = indices.map(|i| patterns[i]);

    let sizes = p.map(|f| f.module_size);
    let min_size = sizes.iter().copied().fold(f32::INFINITY, f32::min);
    let max_size = sizes.iter().copied().fold(0.0f32, f32::max);
    if min_size <= 0.0 || max_size / min_size > MAX_MODULE_RATIO {
        return None;
    }

    // The top-left corner sits opposite the longest side
    let side = |a: usize, b: usize| p[a].center.distance(&p[b].center);
    let opposite = [side(1, 2), side(0, 2), side(0, 1)];
    let corner = (0..3)
        .max_by(|&a, &b| opposite[a].total_cmp(&opposite[b]))
        .unwrap_or(0);
    let (a, b) = ((corner + 1) % 3, (corner + 2) % 3);

    let top_left = p[corner].center;
    let (top_right, bottom_left) = if cross_product_z(&top_left, &p[a].center, &p[b].center) > 0.0 {
        (p[a].center, p[b].center)
    } else {
        (p[b].center, p[a].center)
    };

    let d_tr = top_left.distance(&top_right);
    let d_bl = top_left.distance(&bottom_left);
    let leg_ratio = d_tr.max(d_bl) / d_tr.min(d_bl).max(f32::EPSILON);
    if leg_ratio > MAX_LEG_RATIO {
        return None;
    }

    let dot = (top_right.x - top_left.x) * (bottom_left.x - top_left.x)
        + (top_right.y - top_left.y) * (bottom_left.y - top_left.y);
    let cos = (dot / (d_tr * d_bl)).abs();
    if !cos.is_finite() || cos > MAX_CORNER_COS {
        return None;
    }

    let module_size = sizes.iter().sum::<f32>() / 3.0;
    let dimension = estimate_dimension_from_distance((d_tr + d_bl) / 2.0, module_size)?;

    let size_spread = max_size / min_size - 1.0;
    let score = (leg_ratio - 1.0) + cos + size_spread
        - 0.01 * p.iter().map(|f| f.count.min(20) as f32).sum::<f32>();

    Some(FinderTriple {
        top_left,
        top_right,
        bottom_left,
        module_size,
        dimension,
        indices,
        score,
    })
}

/// Symbol width in modules from the finder center spacing (centers are 7 modules in from both edges)
pub fn estimate_dimension_from_distance(distance: f32, module_size: f32) -> Option<usize> {
    if module_size <= 0.0 || !distance.is_finite() {
        return None;
    }
    let raw = distance / module_size + 7.0;
    let version = ((raw - 17.0) / 4.0).round();
    if !(1.0..=40.0).contains(&version) {
        return None;
    }
    Some(17 + 4 * version as usize)
}
