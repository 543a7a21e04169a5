//! K-means clustering over 2-D points.
//!
//! k-means++ seeding followed by Lloyd iterations, restarted `n_init`
//! times; the run with the lowest inertia wins.

use std::collections::HashSet;

use rand::{rngs::StdRng, Rng, RngExt, SeedableRng};

use crate::error::GridLabelError;

/// Tuning knobs for [`kmeans`].
#[derive(Clone, Debug, PartialEq)]
pub struct KMeansOptions {
    /// Independent restarts; the lowest-inertia result is kept.
    pub n_init: usize,
    /// Lloyd iterations per restart.
    pub max_iter: usize,
    /// Convergence threshold, relative to the mean per-axis variance of
    /// the data. A run stops once the summed squared center shift drops
    /// to or below it.
    pub tolerance: f64,
    /// Seed for reproducible runs; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: None,
        }
    }
}

/// Result of a clustering run.
#[derive(Clone, Debug, PartialEq)]
pub struct KMeansFit {
    pub centers: Vec<[f64; 2]>,
    /// Sum of squared distances from each point to its center.
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart.
    pub iterations: usize,
}

/// Clusters `points` into `k` groups.
///
/// # Errors
/// Fails with [`GridLabelError::AnchorDiscovery`] if `k` is zero, any
/// point is not finite, or there are fewer than `k` distinct points.
pub fn kmeans(
    points: &[[f64; 2]],
    k: usize,
    opts: &KMeansOptions,
) -> Result<KMeansFit, GridLabelError> {
    if k == 0 {
        return Err(GridLabelError::AnchorDiscovery {
            message: "cluster count must be greater than 0".to_string(),
        });
    }

    if let Some(bad) = points.iter().find(|p| !(p[0].is_finite() && p[1].is_finite())) {
        return Err(GridLabelError::AnchorDiscovery {
            message: format!("non-finite box dimensions ({}, {})", bad[0], bad[1]),
        });
    }

    let distinct = count_distinct(points);
    if distinct < k {
        return Err(GridLabelError::AnchorDiscovery {
            message: format!(
                "need at least {} distinct box sizes, found {} among {} boxes",
                k,
                distinct,
                points.len()
            ),
        });
    }

    let tol = opts.tolerance * mean_variance(points);
    let restarts = opts.n_init.max(1);

    let fit = if let Some(seed) = opts.seed {
        let mut rng = StdRng::seed_from_u64(seed);
        best_of(points, k, restarts, opts.max_iter, tol, &mut rng)
    } else {
        let mut rng = rand::rng();
        best_of(points, k, restarts, opts.max_iter, tol, &mut rng)
    };

    Ok(fit)
}

fn best_of<R: Rng + ?Sized>(
    points: &[[f64; 2]],
    k: usize,
    restarts: usize,
    max_iter: usize,
    tol: f64,
    rng: &mut R,
) -> KMeansFit {
    let mut best: Option<KMeansFit> = None;

    for _ in 0..restarts {
        let seeds = plus_plus_seeds(points, k, rng);
        let fit = lloyd(points, seeds, max_iter, tol);
        match &best {
            Some(b) if b.inertia <= fit.inertia => {}
            _ => best = Some(fit),
        }
    }

    best.unwrap_or_else(|| lloyd(points, points[..k].to_vec(), max_iter, tol))
}

/// k-means++: each new center is drawn with probability proportional to
/// its squared distance from the nearest center chosen so far.
fn plus_plus_seeds<R: Rng + ?Sized>(points: &[[f64; 2]], k: usize, rng: &mut R) -> Vec<[f64; 2]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.random_range(0..points.len())]);

    let mut nearest: Vec<f64> = points.iter().map(|p| sq_dist(p, &centers[0])).collect();

    while centers.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let mut draw = rng.random::<f64>() * total;
            let mut chosen = None;
            for (idx, &d) in nearest.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                if draw < d {
                    chosen = Some(idx);
                    break;
                }
                draw -= d;
            }
            // rounding can leave `draw` just past the last weight
            chosen.unwrap_or_else(|| farthest(&nearest))
        } else {
            farthest(&nearest)
        };

        let center = points[next];
        for (d, p) in nearest.iter_mut().zip(points) {
            *d = d.min(sq_dist(p, &center));
        }
        centers.push(center);
    }

    centers
}

fn lloyd(points: &[[f64; 2]], mut centers: Vec<[f64; 2]>, max_iter: usize, tol: f64) -> KMeansFit {
    let k = centers.len();
    let mut labels = vec![0usize; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        assign(points, &centers, &mut labels);

        let mut sums = vec![[0.0f64; 2]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            sums[label][0] += p[0];
            sums[label][1] += p[1];
            counts[label] += 1;
        }

        let mut updated: Vec<[f64; 2]> = Vec::with_capacity(k);
        for cluster in 0..k {
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                updated.push([sums[cluster][0] / n, sums[cluster][1] / n]);
            } else {
                updated.push(centers[cluster]);
            }
        }

        reseed_empty(points, &labels, &counts, &mut updated);

        let shift: f64 = centers
            .iter()
            .zip(&updated)
            .map(|(old, new)| sq_dist(old, new))
            .sum();
        centers = updated;

        if shift <= tol {
            break;
        }
    }

    assign(points, &centers, &mut labels);
    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &label)| sq_dist(p, &centers[label]))
        .sum();

    KMeansFit {
        centers,
        inertia,
        iterations,
    }
}

/// Moves each empty cluster onto the point currently worst served by its
/// own center.
fn reseed_empty(
    points: &[[f64; 2]],
    labels: &[usize],
    counts: &[usize],
    centers: &mut [[f64; 2]],
) {
    let mut taken: HashSet<usize> = HashSet::new();

    for cluster in 0..centers.len() {
        if counts[cluster] > 0 {
            continue;
        }

        let candidate = points
            .iter()
            .enumerate()
            .filter(|(idx, _)| !taken.contains(idx))
            .map(|(idx, p)| (idx, sq_dist(p, &centers[labels[idx]])))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((idx, _)) = candidate {
            taken.insert(idx);
            centers[cluster] = points[idx];
        }
    }
}

fn assign(points: &[[f64; 2]], centers: &[[f64; 2]], labels: &mut [usize]) {
    for (p, label) in points.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (idx, c) in centers.iter().enumerate() {
            let d = sq_dist(p, c);
            if d < best_dist {
                best_dist = d;
                best = idx;
            }
        }
        *label = best;
    }
}

fn farthest(nearest: &[f64]) -> usize {
    nearest
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

#[inline]
fn sq_dist(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn mean_variance(points: &[[f64; 2]]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let mut var = 0.0;
    for axis in 0..2 {
        let mean = points.iter().map(|p| p[axis]).sum::<f64>() / n;
        var += points.iter().map(|p| (p[axis] - mean).powi(2)).sum::<f64>() / n;
    }
    var / 2.0
}

fn count_distinct(points: &[[f64; 2]]) -> usize {
    points
        .iter()
        .map(|p| (p[0].to_bits(), p[1].to_bits()))
        .collect::<HashSet<_>>()
        .len()
}
