// Keyframe search.
//
// Short animations try every subset of up to four keyframes. Longer ones get
// fewer keys, and past 12 frames the three-key sets are evenly spaced with a
// couple of phase shifts instead of every combination.

use itertools::Itertools;

pub fn max_keys(frame_count: usize) -> usize {
    match frame_count {
        0..=8 => usize::min(frame_count, 4),
        9..=16 => 3,
        _ => 2,
    }
}

/// Every keyframe set worth trying for an animation of `frame_count` frames.
/// Never empty for a non-empty animation.
pub fn candidates(frame_count: usize) -> Vec<Vec<usize>> {
    let n = frame_count;
    let mut out = Vec::new();

    for k in 1..=max_keys(n) {
        if n > 12 && k >= 3 {
            let step = n / k;
            let base = (0..k).map(|i| i * step).collect::<Vec<_>>();
            let shifted = (1..usize::min(3, step))
                .map(|offset| base.iter().map(|b| (b + offset) % n).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            out.push(base);
            out.extend(shifted);
        } else {
            out.extend((0..n).combinations(k));
        }
    }

    out
}

pub fn hamming(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Pairwise frame distances, computed once and shared by every candidate.
pub struct DistanceTable {
    size: usize,
    distances: Vec<usize>,
}

impl DistanceTable {
    pub fn new<F: AsRef<[u8]>>(frames: &[F]) -> Self {
        let size = frames.len();
        let mut distances = vec![0; size * size];
        for (i, j) in (0..size).tuple_combinations() {
            let d = hamming(frames[i].as_ref(), frames[j].as_ref());
            distances[i * size + j] = d;
            distances[j * size + i] = d;
        }
        Self { size, distances }
    }

    pub fn distance(&self, a: usize, b: usize) -> usize {
        self.distances[a * self.size + b]
    }

    /// For each frame, the position in `keys` of its nearest keyframe. Ties
    /// go to the earliest key.
    pub fn assign(&self, keys: &[usize]) -> Vec<usize> {
        (0..self.size)
            .map(|frame| {
                (0..keys.len())
                    .min_by_key(|&k| self.distance(keys[k], frame))
                    .unwrap_or(0)
            })
            .collect()
    }
}

pub fn assign<F: AsRef<[u8]>>(frames: &[F], keys: &[usize]) -> Vec<usize> {
    frames
        .iter()
        .map(|frame| {
            (0..keys.len())
                .min_by_key(|&k| hamming(frames[keys[k]].as_ref(), frame.as_ref()))
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_animations_are_exhaustive() {
        // 4 + 6 + 4 + 1 subsets of a 4-frame animation
        let c = candidates(4);
        assert_eq!(c.len(), 15);
        assert_eq!(c[0], vec![0]);
        assert_eq!(c[14], vec![0, 1, 2, 3]);
        assert_eq!(candidates(1), vec![vec![0]]);
    }

    #[test]
    fn mid_length_limits_to_three() {
        // C(10,1) + C(10,2) + C(10,3)
        assert_eq!(candidates(10).len(), 10 + 45 + 120);
        assert!(candidates(10).iter().all(|c| c.len() <= 3));
    }

    #[test]
    fn long_animations_use_strides() {
        let c = candidates(15);
        let triples = c.iter().filter(|c| c.len() == 3).collect::<Vec<_>>();
        assert_eq!(
            triples,
            vec![&vec![0, 5, 10], &vec![1, 6, 11], &vec![2, 7, 12]]
        );
        assert_eq!(c.len(), 15 + 105 + 3);
    }

    #[test]
    fn very_long_animations_use_pairs() {
        let c = candidates(20);
        assert_eq!(c.len(), 20 + 190);
        assert!(c.iter().all(|c| c.len() <= 2));
    }

    #[test]
    fn assignment_picks_nearest_then_earliest() {
        let frames = [
            vec![0, 0, 0, 0],
            vec![1, 1, 1, 1],
            vec![0, 0, 1, 1], // equidistant from both keys
            vec![1, 1, 1, 0],
        ];
        let keys = [0, 1];
        assert_eq!(assign(&frames, &keys), vec![0, 1, 0, 1]);
        assert_eq!(DistanceTable::new(&frames).assign(&keys), vec![0, 1, 0, 1]);
    }
}
