//! Decay scoring of a single waffle.

use crate::libs::error::WaffleError;
use crate::libs::matrix::Window;
use crate::libs::profile::{rank_average, DecayProfile};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::str::FromStr;

/// Which decay model a window is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecayMode {
    /// Anchored loop: the anchor column belongs to the between cells
    #[default]
    Loop,
    /// No anchor: the between cells stop one column short of it
    NoLoop,
}

impl FromStr for DecayMode {
    type Err = WaffleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loop" => Ok(DecayMode::Loop),
            "no-loop" | "noloop" => Ok(DecayMode::NoLoop),
            _ => Err(WaffleError::UnknownMetric(s.to_string())),
        }
    }
}

impl std::fmt::Display for DecayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecayMode::Loop => write!(f, "loop"),
            DecayMode::NoLoop => write!(f, "no-loop"),
        }
    }
}

/// Row-major offsets of a window split into the cells lying between the two
/// anchors (lower-left, next to the diagonal) and everything else.
///
/// Together the two lists are a permutation of `0..size²`; `between`
/// followed by `outside` is the order of the decay observation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayPartition {
    pub between: Vec<usize>,
    pub outside: Vec<usize>,
}

impl DecayPartition {
    pub fn new(waffle_size: usize, mode: DecayMode) -> Self {
        let radius = waffle_size / 2;
        // first column of the lower rows that is not "between"
        let edge = match mode {
            DecayMode::Loop => radius + 1,
            DecayMode::NoLoop => radius,
        };

        let between = (radius..waffle_size)
            .flat_map(|i| (0..edge).map(move |j| j + i * waffle_size))
            .collect();
        let outside = (radius..waffle_size)
            .flat_map(|i| (edge..waffle_size).map(move |j| j + i * waffle_size))
            .chain((0..radius).flat_map(|i| (0..waffle_size).map(move |j| j + i * waffle_size)))
            .collect();

        Self { between, outside }
    }
}

/// Scores windows of one size against a [`DecayProfile`].
///
/// The partition and the reference ranks are computed once and reused for
/// every window of every block.
#[derive(Debug, Clone)]
pub struct DecayScorer {
    size: usize,
    partition: DecayPartition,
    reference: Vec<f64>,
}

impl DecayScorer {
    pub fn new(profile: &DecayProfile, mode: DecayMode) -> Self {
        let size = profile.size();
        let partition = DecayPartition::new(size, mode);
        let ranks = profile.ranks();
        let reference = partition
            .between
            .iter()
            .chain(&partition.outside)
            .map(|&k| ranks[k])
            .collect();

        Self {
            size,
            partition,
            reference,
        }
    }

    /// Observed signal of every window cell in partition order. Cells
    /// between the anchors carry the domain enrichment on top of the
    /// radial decay and are halved.
    pub fn decay(&self, window: &Window) -> Vec<f64> {
        debug_assert_eq!(window.height(), self.size);
        debug_assert_eq!(window.width(), self.size);

        let cell = |k: usize| window.get(k / self.size, k % self.size);
        self.partition
            .between
            .iter()
            .map(|&k| cell(k) / 2.0)
            .chain(self.partition.outside.iter().map(|&k| cell(k)))
            .collect()
    }

    /// Spearman `(rho, pvalue)` of the window decay against the profile, or
    /// `None` when the decay has no variance.
    pub fn score(&self, window: &Window) -> Option<(f64, f64)> {
        let observed = rank_average(&self.decay(window));
        pearson(&self.reference, &observed)
    }
}

/// Pearson correlation with its two-sided p-value (Student t, `n - 2`
/// degrees of freedom). `None` if either series is constant.
///
/// ```
/// let (r, p) = waffle::libs::decay::pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 9.0]).unwrap();
/// assert!(r > 0.98 && p < 0.05);
/// assert!(waffle::libs::decay::pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_none());
/// ```
pub fn pearson(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let r = (cov / denom).clamp(-1.0, 1.0);

    let df = (n - 2) as f64;
    let pval = if df == 0.0 {
        1.0
    } else if 1.0 - r * r <= f64::EPSILON {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        (2.0 * dist.cdf(-t.abs())).min(1.0)
    };

    Some((r, pval))
}

/// Mean signal of the `(2 * span + 1)²` cells around the window center.
pub fn peak_intensity(window: &Window, span: usize) -> f64 {
    let size = window.height().min(window.width());
    let center = size / 2;
    let lo = center.saturating_sub(span);
    let hi = (center + span + 1).min(size);

    let mut total = 0.0;
    for i in lo..hi {
        for j in lo..hi {
            total += window.get(i, j);
        }
    }
    total / ((hi - lo) * (hi - lo)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::matrix::{ContactMatrix, WaffleGrid};
    use approx::assert_relative_eq;

    fn grid_of(rows: &[&[f64]]) -> WaffleGrid {
        let mut m = ContactMatrix::new(rows.len(), rows[0].len());
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    m.insert(i, j, v);
                }
            }
        }
        WaffleGrid::from_contacts(&m)
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("loop".parse::<DecayMode>().unwrap(), DecayMode::Loop);
        assert_eq!("no-loop".parse::<DecayMode>().unwrap(), DecayMode::NoLoop);
        assert!("peak".parse::<DecayMode>().is_err());
        assert_eq!(DecayMode::NoLoop.to_string(), "no-loop");
    }

    #[test]
    fn test_partition_is_permutation() {
        for size in [1, 3, 5, 9] {
            for mode in [DecayMode::Loop, DecayMode::NoLoop] {
                let p = DecayPartition::new(size, mode);
                let mut all: Vec<usize> = p.between.iter().chain(&p.outside).copied().collect();
                all.sort_unstable();
                assert_eq!(all, (0..size * size).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_partition_size_three() {
        let p = DecayPartition::new(3, DecayMode::Loop);
        assert_eq!(p.between, vec![3, 4, 6, 7]);
        assert_eq!(p.outside, vec![5, 8, 0, 1, 2]);

        let p = DecayPartition::new(3, DecayMode::NoLoop);
        assert_eq!(p.between, vec![3, 6]);
        assert_eq!(p.outside, vec![4, 5, 7, 8, 0, 1, 2]);
    }

    #[test]
    fn test_score_diagonal_scenario() {
        let grid = grid_of(&[&[0.0, 1.0, 2.0], &[1.0, 0.0, 1.0], &[2.0, 1.0, 0.0]]);
        let window = grid.window(0, 0, 3);
        let profile = DecayProfile::new(3).unwrap();

        let loop_scorer = DecayScorer::new(&profile, DecayMode::Loop);
        assert_eq!(loop_scorer.decay(&window).len(), 9);
        let (rho, pval) = loop_scorer.score(&window).unwrap();
        assert!((-1.0..=1.0).contains(&rho));
        assert!((0.0..=1.0).contains(&pval));
        assert_relative_eq!(rho, 7.5 / 2775.0_f64.sqrt(), epsilon = 1e-12);

        let noloop_scorer = DecayScorer::new(&profile, DecayMode::NoLoop);
        assert_eq!(noloop_scorer.decay(&window).len(), 9);
        let (rho2, pval2) = noloop_scorer.score(&window).unwrap();
        assert!((-1.0..=1.0).contains(&rho2));
        assert!((0.0..=1.0).contains(&pval2));
        assert_relative_eq!(rho2, 5.5 / 2650.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_score_peak_decays() {
        let grid = grid_of(&[&[1.0, 4.0, 1.0], &[4.0, 8.0, 4.0], &[1.0, 4.0, 1.0]]);
        let window = grid.window(0, 0, 3);
        let profile = DecayProfile::new(3).unwrap();

        for mode in [DecayMode::Loop, DecayMode::NoLoop] {
            let (rho, pval) = DecayScorer::new(&profile, mode).score(&window).unwrap();
            assert!(rho < -0.85, "{} gave {}", mode, rho);
            assert!(pval < 0.01);
        }
    }

    #[test]
    fn test_decay_covers_every_cell() {
        let row: &[f64] = &[2.0; 5];
        let grid = grid_of(&[row; 5]);
        let window = grid.window(0, 0, 5);
        let profile = DecayProfile::new(5).unwrap();

        for mode in [DecayMode::Loop, DecayMode::NoLoop] {
            let scorer = DecayScorer::new(&profile, mode);
            let decay = scorer.decay(&window);
            assert_eq!(decay.len(), 25);

            let nbetween = DecayPartition::new(5, mode).between.len();
            assert!(decay[..nbetween].iter().all(|&v| v == 1.0));
            assert!(decay[nbetween..].iter().all(|&v| v == 2.0));
        }
    }

    #[test]
    fn test_score_flat_decay_is_undefined() {
        // between cells twice as strong as the rest: flat once halved
        let profile = DecayProfile::new(5).unwrap();
        for mode in [DecayMode::Loop, DecayMode::NoLoop] {
            let partition = DecayPartition::new(5, mode);
            let mut m = ContactMatrix::new(5, 5);
            for k in 0..25 {
                let v = if partition.between.contains(&k) { 4.0 } else { 2.0 };
                m.insert(k / 5, k % 5, v);
            }
            let grid = WaffleGrid::from_contacts(&m);
            let window = grid.window(0, 0, 5);
            assert!(DecayScorer::new(&profile, mode).score(&window).is_none());
        }
    }

    #[test]
    fn test_pearson_pvalue() {
        // scipy.stats.pearsonr([1, 2, 3, 4, 5], [2, 1, 4, 3, 5]) -> (0.8, 0.10408803866182788)
        let (r, p) = pearson(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 1.0, 4.0, 3.0, 5.0]).unwrap();
        assert_relative_eq!(r, 0.8, epsilon = 1e-12);
        assert_relative_eq!(p, 0.10408803866182788, epsilon = 1e-6);

        let (r, p) = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert_relative_eq!(r, -1.0);
        assert_eq!(p, 0.0);

        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&[1.0, 2.0], &[1.0]).is_none());
    }

    #[test]
    fn test_peak_intensity() {
        let grid = grid_of(&[
            &[9.0, 0.0, 0.0, 0.0, 9.0],
            &[0.0, 1.0, 1.0, 1.0, 0.0],
            &[0.0, 1.0, 10.0, 1.0, 0.0],
            &[0.0, 1.0, 1.0, 1.0, 0.0],
            &[9.0, 0.0, 0.0, 0.0, 9.0],
        ]);
        let window = grid.window(0, 0, 5);
        assert_relative_eq!(peak_intensity(&window, 1), 2.0);
        assert_relative_eq!(peak_intensity(&window, 0), 10.0);
        assert_relative_eq!(peak_intensity(&window, 2), 54.0 / 25.0);
    }
}
