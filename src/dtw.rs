//! Banded dynamic time warping over MFCC feature matrices (SPEC_FULL.md §4.5).
//!
//! The per-frame local distance is the plain squared-Euclidean sum used by
//! `similarity::distance::squared_euclidean_distance` in the example corpus
//! (same `zip().map(diff*diff).sum()` shape); the banding, step pattern, and
//! decay-to-similarity mapping are new, since DTW itself has no corpus
//! analogue.

use ndarray::Array2;

/// Exponential-decay constant used to turn an accumulated DTW cost into a
/// `[0, 1]` similarity score: `similarity = exp(-DTW_DECAY_K * mean_cost)`.
pub const DTW_DECAY_K: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtwResult {
    pub cost: f32,
    pub similarity: f32,
    pub path_len: usize,
}

/// Squared-Euclidean local distance between two feature frames, accumulated
/// in f64 for numerical stability over long alignments.
fn local_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = (*x - *y) as f64;
            diff * diff
        })
        .sum()
}

/// Sakoe-Chiba banded DTW matcher, holding only the window ratio: the cost
/// matrix is allocated fresh per alignment since master/user lengths vary
/// call to call.
pub struct DtwMatcher {
    window_ratio: f32,
}

impl DtwMatcher {
    pub fn new(window_ratio: f32) -> Self {
        Self { window_ratio }
    }

    fn band_radius(&self, n: usize, m: usize) -> usize {
        let longest = n.max(m) as f32;
        ((longest * self.window_ratio).ceil() as usize).max(1)
    }

    /// Full alignment: the path must start at (0,0) and end at (n-1,m-1).
    pub fn full(&self, master: &Array2<f32>, user: &Array2<f32>) -> DtwResult {
        let radius = self.band_radius(master.nrows(), user.nrows());
        self.full_with_radius(master, user, radius)
    }

    /// Subsequence alignment: the path may begin anywhere along the master
    /// axis but must still consume the whole user sequence — the cheapest
    /// location for the user's utterance to sit inside the (possibly longer)
    /// master recording.
    pub fn subsequence(&self, master: &Array2<f32>, user: &Array2<f32>) -> DtwResult {
        let radius = self.band_radius(master.nrows(), user.nrows());
        self.subsequence_with_radius(master, user, radius)
    }

    /// Finalize's full pass (§4.7 step 2): ignores the configured
    /// `window_ratio` and instead bands the matrix at `4 * min(n, m)`, wide
    /// enough that the band is rarely the binding constraint while still
    /// bounding worst-case cost on pathological lengths.
    pub fn full_uncapped_by_ratio(&self, master: &Array2<f32>, user: &Array2<f32>) -> DtwResult {
        let radius = self.finalize_radius(master.nrows(), user.nrows());
        self.full_with_radius(master, user, radius)
    }

    pub fn subsequence_uncapped_by_ratio(
        &self,
        master: &Array2<f32>,
        user: &Array2<f32>,
    ) -> DtwResult {
        let radius = self.finalize_radius(master.nrows(), user.nrows());
        self.subsequence_with_radius(master, user, radius)
    }

    fn finalize_radius(&self, n: usize, m: usize) -> usize {
        (4 * n.min(m).max(1)).min(n.max(m).max(1))
    }

    fn full_with_radius(&self, master: &Array2<f32>, user: &Array2<f32>, radius: usize) -> DtwResult {
        let n = master.nrows();
        let m = user.nrows();
        let cost = self.banded_matrix(master, user, radius, false);
        let final_cost = cost[[n, m]];
        let mean_cost = final_cost / (n + m).max(1) as f64;
        DtwResult {
            cost: final_cost as f32,
            similarity: (-DTW_DECAY_K * mean_cost).exp() as f32,
            path_len: n + m,
        }
    }

    fn subsequence_with_radius(
        &self,
        master: &Array2<f32>,
        user: &Array2<f32>,
        radius: usize,
    ) -> DtwResult {
        let m = user.nrows();
        let cost = self.banded_matrix(master, user, radius, true);
        let final_col = cost.column(m);
        let final_cost = final_col.iter().cloned().fold(f64::INFINITY, f64::min);
        let mean_cost = final_cost / m.max(1) as f64;
        DtwResult {
            cost: final_cost as f32,
            similarity: (-DTW_DECAY_K * mean_cost).exp() as f32,
            path_len: m,
        }
    }

    /// Symmetric step pattern (diagonal weight 2) with a Sakoe-Chiba band.
    /// Cells outside the band are left at infinity. `free_start` relaxes the
    /// first-column boundary condition to zero across every master row,
    /// which is what makes [`Self::subsequence`] scan-invariant on where
    /// along the master the match begins, while the user axis still has to
    /// be fully consumed (column index reaches `m`) for a path to count.
    fn banded_matrix(
        &self,
        master: &Array2<f32>,
        user: &Array2<f32>,
        radius: usize,
        free_start: bool,
    ) -> Array2<f64> {
        let n = master.nrows();
        let m = user.nrows();
        let mut cost = Array2::<f64>::from_elem((n + 1, m + 1), f64::INFINITY);

        if free_start {
            for i in 0..=n {
                cost[[i, 0]] = 0.0;
            }
        } else {
            cost[[0, 0]] = 0.0;
        }

        for i in 1..=n {
            let lo = (i * m / n.max(1)).saturating_sub(radius);
            let hi = (i * m / n.max(1) + radius).min(m);
            for j in lo.max(1)..=hi {
                let d = local_distance(
                    master.row(i - 1).as_slice().unwrap(),
                    user.row(j - 1).as_slice().unwrap(),
                );
                let diag = cost[[i - 1, j - 1]];
                let up = cost[[i - 1, j]];
                let left = cost[[i, j - 1]];
                let best = diag.min(up).min(left);
                cost[[i, j]] = best + d;
            }
        }
        cost
    }
}
