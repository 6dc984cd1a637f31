//! Ordering of Ritz values by the requested part of the spectrum.
//!
//! For real non-symmetric operators the Ritz values come in complex-conjugate
//! pairs that must never be separated: a restart that kept only one member of
//! a pair would leave the real Krylov basis unable to represent it. Values are
//! therefore grouped into [`Cluster`]s first and the clusters are ranked.

use crate::problem::Which;
use faer::c64;
use std::cmp::Ordering;

/// A real Ritz value or a conjugate pair, positive imaginary part first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cluster {
    Single(usize),
    Pair(usize, usize),
}

impl Cluster {
    pub(crate) fn len(self) -> usize {
        match self {
            Cluster::Single(_) => 1,
            Cluster::Pair(..) => 2,
        }
    }

    pub(crate) fn leading(self) -> usize {
        match self {
            Cluster::Single(i) | Cluster::Pair(i, _) => i,
        }
    }

    pub(crate) fn indices(self) -> impl Iterator<Item = usize> {
        let (first, second) = match self {
            Cluster::Single(i) => (i, None),
            Cluster::Pair(i, j) => (i, Some(j)),
        };
        std::iter::once(first).chain(second)
    }
}

/// Groups `values` into clusters. With `pair_conjugates` unset every value is its own cluster.
pub(crate) fn clusters(values: &[c64], pair_conjugates: bool) -> Vec<Cluster> {
    if !pair_conjugates {
        return (0..values.len()).map(Cluster::Single).collect();
    }

    let mut used = vec![false; values.len()];
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let v = values[i];
        if v.im == 0.0 {
            out.push(Cluster::Single(i));
            continue;
        }
        // Closest unused value to the conjugate, opposite sign of the imaginary part.
        let partner = (0..values.len())
            .filter(|&j| !used[j] && values[j].im * v.im < 0.0)
            .min_by(|&a, &b| {
                let da = (values[a] - v.conj()).norm();
                let db = (values[b] - v.conj()).norm();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            });
        match partner {
            Some(j) => {
                used[j] = true;
                if v.im > 0.0 {
                    out.push(Cluster::Pair(i, j));
                } else {
                    out.push(Cluster::Pair(j, i));
                }
            }
            None => out.push(Cluster::Single(i)),
        }
    }
    out
}

/// First value of `clusters` that is complex but was not matched with a conjugate.
pub(crate) fn unpaired(values: &[c64], clusters: &[Cluster]) -> Option<usize> {
    clusters.iter().find_map(|&cluster| match cluster {
        Cluster::Single(i) if values[i].im != 0.0 => Some(i),
        _ => None,
    })
}

/// Sort key, larger is more wanted.
fn key(value: c64, which: Which, pair_conjugates: bool) -> f64 {
    let imag = if pair_conjugates { value.im.abs() } else { value.im };
    match which {
        Which::LargestMagnitude => value.norm(),
        Which::SmallestMagnitude => -value.norm(),
        Which::LargestReal | Which::LargestAlgebraic | Which::BothEnds => value.re,
        Which::SmallestReal | Which::SmallestAlgebraic => -value.re,
        Which::LargestImaginary => imag,
        Which::SmallestImaginary => -imag,
    }
}

/// Clusters of `values` ordered from most to least wanted.
///
/// `BothEnds` alternates between the largest and the smallest remaining
/// value, starting from the large end.
pub(crate) fn rank(values: &[c64], which: Which, pair_conjugates: bool) -> Vec<Cluster> {
    let mut ranked = clusters(values, pair_conjugates);
    ranked.sort_by(|a, b| {
        let ka = key(values[a.leading()], which, pair_conjugates);
        let kb = key(values[b.leading()], which, pair_conjugates);
        kb.partial_cmp(&ka).unwrap_or(Ordering::Equal)
    });

    if which != Which::BothEnds {
        return ranked;
    }

    let mut interleaved = Vec::with_capacity(ranked.len());
    let (mut lo, mut hi) = (0, ranked.len());
    let mut take_high = true;
    while lo < hi {
        if take_high {
            interleaved.push(ranked[lo]);
            lo += 1;
        } else {
            hi -= 1;
            interleaved.push(ranked[hi]);
        }
        take_high = !take_high;
    }
    interleaved
}

/// Length of the shortest prefix of `ranked` holding at least `nev` values.
pub(crate) fn wanted_prefix(ranked: &[Cluster], nev: usize) -> (usize, usize) {
    let mut count = 0;
    for (c, cluster) in ranked.iter().enumerate() {
        if count >= nev {
            return (c, count);
        }
        count += cluster.len();
    }
    (ranked.len(), count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> c64 {
        c64::new(re, im)
    }

    #[test]
    fn test_pairs_are_grouped_positive_first() {
        let values = [c(1.0, -2.0), c(3.0, 0.0), c(1.0, 2.0)];
        let grouped = clusters(&values, true);
        assert_eq!(grouped, vec![Cluster::Pair(2, 0), Cluster::Single(1)]);
        assert_eq!(grouped[0].indices().collect::<Vec<_>>(), vec![2, 0]);
    }

    #[test]
    fn test_lone_complex_value_is_reported_unpaired() {
        let values = [c(2.0, 0.0), c(1.0, 3.0), c(4.0, 1.0), c(4.0, -1.0)];
        let grouped = clusters(&values, true);
        assert!(grouped.contains(&Cluster::Single(1)));
        assert_eq!(unpaired(&values, &grouped), Some(1));

        let paired = [c(2.0, 0.0), c(4.0, 1.0), c(4.0, -1.0)];
        assert_eq!(unpaired(&paired, &clusters(&paired, true)), None);
    }

    #[test]
    fn test_largest_magnitude_ranking() {
        let values = [c(1.0, 0.0), c(-5.0, 0.0), c(3.0, 0.0)];
        let ranked = rank(&values, Which::LargestMagnitude, false);
        let order: Vec<usize> = ranked.iter().map(|c| c.leading()).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_both_ends_alternates() {
        let values = [c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0), c(4.0, 0.0), c(5.0, 0.0)];
        let ranked = rank(&values, Which::BothEnds, false);
        let order: Vec<usize> = ranked.iter().map(|c| c.leading()).collect();
        assert_eq!(order, vec![4, 0, 3, 1, 2]);
    }

    #[test]
    fn test_wanted_prefix_extends_over_pair() {
        let values = [c(5.0, 0.0), c(0.0, 4.0), c(0.0, -4.0), c(1.0, 0.0)];
        let ranked = rank(&values, Which::LargestMagnitude, true);
        assert_eq!(ranked[1], Cluster::Pair(1, 2));
        // two values requested, the pair forces a third
        assert_eq!(wanted_prefix(&ranked, 2), (2, 3));
        assert_eq!(wanted_prefix(&ranked, 3), (2, 3));
        assert_eq!(wanted_prefix(&ranked, 1), (1, 1));
    }

    #[test]
    fn test_imaginary_selector_uses_magnitude_for_real_operators() {
        let values = [c(0.0, 1.0), c(0.0, -1.0), c(0.0, 0.5), c(0.0, -0.5)];
        let ranked = rank(&values, Which::SmallestImaginary, true);
        assert_eq!(ranked[0], Cluster::Pair(2, 3));

        let ranked = rank(&values, Which::SmallestImaginary, false);
        assert_eq!(ranked[0], Cluster::Single(1));
    }
}
