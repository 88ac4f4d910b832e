//! Reference ranking of the distance of every window cell from its center.

use crate::libs::error::WaffleError;

/// Average ranks (1-based) of `data`; tied values share the mean of the
/// ranks they would occupy.
///
/// ```
/// let r = waffle::libs::profile::rank_average(&[3.0, 1.0, 2.0, 2.0]);
/// assert_eq!(r, vec![4.0, 1.0, 2.5, 2.5]);
/// ```
pub fn rank_average(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| data[a].total_cmp(&data[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && data[order[j]].total_cmp(&data[order[i]]).is_eq() {
            j += 1;
        }
        // ranks i+1 ..= j
        let rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }
        i = j;
    }

    ranks
}

/// Distance-from-center ranks of a square window, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayProfile {
    size: usize,
    ranks: Vec<f64>,
}

impl DecayProfile {
    pub fn new(waffle_size: usize) -> Result<Self, WaffleError> {
        if waffle_size == 0 || waffle_size % 2 == 0 {
            return Err(WaffleError::InvalidWaffleSize(waffle_size));
        }

        let center = (waffle_size / 2) as f64;
        let dists: Vec<f64> = (0..waffle_size)
            .flat_map(|i| (0..waffle_size).map(move |j| (i as f64, j as f64)))
            .map(|(i, j)| ((i - center).powi(2) + (j - center).powi(2)).sqrt())
            .collect();

        Ok(Self {
            size: waffle_size,
            ranks: rank_average(&dists),
        })
    }

    pub fn from_radius(radius: usize) -> Result<Self, WaffleError> {
        Self::new(radius * 2 + 1)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ranks(&self) -> &[f64] {
        &self.ranks
    }

    pub fn rank_at(&self, row: usize, col: usize) -> f64 {
        self.ranks[row * self.size + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_average_all_equal() {
        assert_eq!(rank_average(&[5.0, 5.0, 5.0]), vec![2.0, 2.0, 2.0]);
        assert!(rank_average(&[]).is_empty());
    }

    #[test]
    fn test_profile_size_three() {
        let profile = DecayProfile::new(3).unwrap();
        // center, then 4 edge midpoints (ranks 2..=5), then 4 corners (6..=9)
        assert_eq!(
            profile.ranks(),
            &[7.5, 3.5, 7.5, 3.5, 1.0, 3.5, 7.5, 3.5, 7.5]
        );
    }

    #[test]
    fn test_profile_rotation_symmetry() {
        for size in [1, 3, 5, 7, 21] {
            let profile = DecayProfile::new(size).unwrap();
            assert_eq!(profile.ranks().len(), size * size);

            let last = size - 1;
            for i in 0..size {
                for j in 0..size {
                    let r = profile.rank_at(i, j);
                    assert_eq!(r, profile.rank_at(j, last - i));
                    assert_eq!(r, profile.rank_at(last - i, last - j));
                    assert_eq!(r, profile.rank_at(last - j, i));
                }
            }
        }
    }

    #[test]
    fn test_profile_center_is_lowest() {
        let profile = DecayProfile::from_radius(2).unwrap();
        let center = profile.rank_at(2, 2);
        assert_eq!(center, 1.0);
        assert!(profile.ranks().iter().all(|&r| r >= center));
    }

    #[test]
    fn test_profile_invalid_size() {
        assert_eq!(
            DecayProfile::new(4).unwrap_err(),
            WaffleError::InvalidWaffleSize(4)
        );
        assert!(DecayProfile::new(0).is_err());
    }
}
