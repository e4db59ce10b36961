//! Flattening of non-decreasing index tuples.
//!
//! Groups which hold one aggregate per unordered combination of filters (for example the
//! second-order moment of filters `i1 <= i2`) store them in a flat `Vec`. The tuples are
//! enumerated in the order of the nested loops
//!
//! ```text
//! for i1 in 0..n { for i2 in i1..n { for i3 in i2..n { ... } } }
//! ```
//!
//! and every group uses the functions here to go between a tuple and its offset.

/// Binomial coefficient $`\binom{m}{r}`$.
fn binomial(m: usize, r: usize) -> usize {
    if r > m {
        return 0;
    }
    let r = r.min(m - r);
    (0..r).fold(1, |acc, i| acc * (m - i) / (i + 1))
}

/// The number of non-decreasing `k`-tuples with entries in `0..n`, $`\binom{n+k-1}{k}`$.
pub fn n_combinations(n: usize, k: usize) -> usize {
    if k == 0 {
        return 1;
    }
    if n == 0 {
        return 0;
    }
    binomial(n + k - 1, k)
}

/// The offset of a non-decreasing tuple of indices (each below `n`) in the nested-loop order.
///
/// # Notes
///
/// The tuple must be non-decreasing. Decreasing entries do not panic but give a meaningless
/// offset.
pub fn index_for_combination(indices: &[usize], n: usize) -> usize {
    let k = indices.len();
    let mut offset = 0;
    let mut previous = 0;
    for (position, &index) in indices.iter().enumerate() {
        let remaining = k - position - 1;
        for value in previous..index {
            offset += n_combinations(n - value, remaining);
        }
        previous = index;
    }
    offset
}

/// The inverse of [`index_for_combination`]: the `index`-th non-decreasing `k`-tuple over
/// `0..n`.
pub fn combination_for_index(index: usize, n: usize, k: usize) -> Vec<usize> {
    let mut remaining_index = index;
    let mut tuple = Vec::with_capacity(k);
    let mut value = 0;
    for position in 0..k {
        let remaining = k - position - 1;
        while value + 1 < n {
            let block = n_combinations(n - value, remaining);
            if remaining_index < block {
                break;
            }
            remaining_index -= block;
            value += 1;
        }
        tuple.push(value);
    }
    tuple
}

/// An iterator over the non-decreasing `k`-tuples of `0..n` in nested-loop order.
///
/// ```
/// use cap_core::Combinations;
/// let pairs: Vec<Vec<usize>> = Combinations::new(2, 2).collect();
/// assert_eq!(pairs, vec![vec![0, 0], vec![0, 1], vec![1, 1]]);
/// ```
#[derive(Clone, Debug)]
pub struct Combinations {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        let current = if n == 0 && k > 0 {
            None
        } else {
            Some(vec![0; k])
        };
        Self { n, current }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let mut successor = current.clone();
        if let Some(position) = successor.iter().rposition(|&i| i + 1 < self.n) {
            let value = successor[position] + 1;
            successor[position..].iter_mut().for_each(|i| *i = value);
            self.current = Some(successor);
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        assert_eq!(n_combinations(4, 1), 4);
        assert_eq!(n_combinations(4, 2), 10);
        assert_eq!(n_combinations(4, 3), 20);
        assert_eq!(n_combinations(4, 4), 35);
        assert_eq!(n_combinations(0, 2), 0);
        assert_eq!(n_combinations(3, 0), 1);
        for n in 0..6 {
            for k in 1..5 {
                assert_eq!(Combinations::new(n, k).count(), n_combinations(n, k));
            }
        }
    }

    #[test]
    fn test_nested_loop_order() {
        let n = 4;
        let mut expected = Vec::new();
        for i1 in 0..n {
            for i2 in i1..n {
                for i3 in i2..n {
                    expected.push(vec![i1, i2, i3]);
                }
            }
        }
        let generated: Vec<Vec<usize>> = Combinations::new(n, 3).collect();
        assert_eq!(generated, expected);
    }

    #[test]
    fn test_flattening_is_a_bijection() {
        for n in 1..6 {
            for k in 2..5 {
                let total = n_combinations(n, k);
                for (offset, tuple) in Combinations::new(n, k).enumerate() {
                    assert_eq!(index_for_combination(&tuple, n), offset);
                    assert_eq!(combination_for_index(offset, n, k), tuple);
                    assert!(offset < total);
                }
            }
        }
    }

    #[test]
    fn test_pair_offsets() {
        // (0,0) (0,1) (0,2) (1,1) (1,2) (2,2)
        assert_eq!(index_for_combination(&[0, 2], 3), 2);
        assert_eq!(index_for_combination(&[1, 1], 3), 3);
        assert_eq!(index_for_combination(&[2, 2], 3), 5);
        assert_eq!(combination_for_index(4, 3, 2), vec![1, 2]);
    }
}
