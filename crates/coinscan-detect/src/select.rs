//! Combinatorial best-six selection.
//!
//! When more than six candidates survive filtering, the pool is trimmed to
//! the 14 candidates nearest the median area and every 6-combination is
//! scored for vertical alignment, even spacing, size uniformity, and small
//! horizontal spread. C(14, 6) = 3003 keeps the exhaustive search cheap; the
//! pool cap is a hard invariant, not a tunable.

use nalgebra::Point2;

use crate::candidates::Candidate;

const POOL_CAP: usize = 14;
const PICK: usize = 6;

const W_LINE: f32 = 2.0;
const W_SPACING: f32 = 1.4;
const W_SIZE: f32 = 1.0;
const W_SPREAD: f32 = 1.4;

pub(crate) fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

fn std_dev(values: &[f32], mean: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32;
    variance.sqrt()
}

/// Least-squares fit of x as a function of y.
///
/// A vertical coin column has nearly constant x, so regressing x over y
/// keeps the fit well-conditioned where a y-over-x fit would blow up.
pub(crate) fn fit_line_x_over_y(points: &[Point2<f32>]) -> (f32, f32) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean_y = mean(&points.iter().map(|p| p.y).collect::<Vec<_>>());
    let mean_x = mean(&points.iter().map(|p| p.x).collect::<Vec<_>>());

    let mut numerator = 0.0f32;
    let mut denominator = 0.0f32;
    for p in points {
        let dy = p.y - mean_y;
        numerator += dy * (p.x - mean_x);
        denominator += dy * dy;
    }
    if denominator == 0.0 {
        return (0.0, mean_x);
    }
    let slope = numerator / denominator;
    (slope, mean_x - slope * mean_y)
}

fn combination_cost(stats: &[(Point2<f32>, f32)]) -> Option<f32> {
    let points: Vec<Point2<f32>> = stats.iter().map(|s| s.0).collect();
    let sizes: Vec<f32> = stats.iter().map(|s| s.1).collect();

    let mean_size = mean(&sizes);
    if mean_size <= 0.0 {
        return None;
    }

    let (slope, intercept) = fit_line_x_over_y(&points);
    let residuals: Vec<f32> = points
        .iter()
        .map(|p| (p.x - (slope * p.y + intercept)).abs())
        .collect();
    let line_deviation = mean(&residuals) / mean_size;

    let mut ys: Vec<f32> = points.iter().map(|p| p.y).collect();
    ys.sort_by(f32::total_cmp);
    let spacings: Vec<f32> = ys.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_spacing = mean(&spacings);
    let spacing_score = std_dev(&spacings, mean_spacing) / mean_spacing.max(mean_size);

    let size_score = std_dev(&sizes, mean_size) / mean_size;

    let xs: Vec<f32> = points.iter().map(|p| p.x).collect();
    let x_spread = xs.iter().cloned().fold(f32::MIN, f32::max)
        - xs.iter().cloned().fold(f32::MAX, f32::min);
    let spread_score = x_spread / mean_size;

    Some(
        line_deviation * W_LINE
            + spacing_score * W_SPACING
            + size_score * W_SIZE
            + spread_score * W_SPREAD,
    )
}

/// Pick the six candidates forming the most column-like arrangement.
///
/// Returns the input unchanged when six or fewer candidates are given.
pub(crate) fn select_best_six(candidates: Vec<Candidate>) -> Vec<Candidate> {
    if candidates.len() <= PICK {
        return candidates;
    }

    let areas: Vec<f32> = candidates.iter().map(|c| c.area).collect();
    let median_area = median(&areas);
    let mut trimmed = candidates;
    trimmed.sort_by(|a, b| {
        (a.area - median_area)
            .abs()
            .total_cmp(&(b.area - median_area).abs())
    });
    trimmed.truncate(POOL_CAP);

    let stats: Vec<(Point2<f32>, f32)> = trimmed
        .iter()
        .map(|c| (c.rect.center(), c.rect.min_side()))
        .collect();

    let mut best_cost = f32::INFINITY;
    let mut best_combo: Vec<usize> = Vec::new();
    let mut indices: Vec<usize> = Vec::with_capacity(PICK);

    fn combine(
        start: usize,
        remaining: usize,
        stats: &[(Point2<f32>, f32)],
        indices: &mut Vec<usize>,
        best_cost: &mut f32,
        best_combo: &mut Vec<usize>,
    ) {
        if remaining == 0 {
            let picked: Vec<(Point2<f32>, f32)> = indices.iter().map(|&i| stats[i]).collect();
            if let Some(cost) = combination_cost(&picked) {
                if cost < *best_cost {
                    *best_cost = cost;
                    *best_combo = indices.clone();
                }
            }
            return;
        }
        if start >= stats.len() {
            return;
        }
        for i in start..=(stats.len() - remaining) {
            indices.push(i);
            combine(i + 1, remaining - 1, stats, indices, best_cost, best_combo);
            indices.pop();
        }
    }

    combine(0, PICK, &stats, &mut indices, &mut best_cost, &mut best_combo);

    best_combo.into_iter().map(|i| trimmed[i]).collect()
}
