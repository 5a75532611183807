//! Seeded train/test split.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Shuffle `items` with `seed` and split off `ceil(test_size * n)` test rows.
///
/// Returns `(train, test)`. The caller validates `test_size`; values outside
/// `(0, 1)` are clamped so the result is always a partition of the input.
pub fn train_test_split<T: Clone>(items: &[T], test_size: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let n_test = ((test_size.clamp(0.0, 1.0) * n as f64).ceil() as usize).min(n);

    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let (test_idx, train_idx) = idx.split_at(n_test);
    let pick = |ids: &[usize]| ids.iter().map(|&i| items[i].clone()).collect::<Vec<_>>();
    (pick(train_idx), pick(test_idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, 0.3, 140, 60)]
    #[case(10, 0.25, 7, 3)]
    #[case(5, 0.5, 2, 3)]
    fn split_sizes(
        #[case] n: usize,
        #[case] test_size: f64,
        #[case] n_train: usize,
        #[case] n_test: usize,
    ) {
        let items: Vec<usize> = (0..n).collect();
        let (train, test) = train_test_split(&items, test_size, 0);
        assert_eq!(train.len(), n_train);
        assert_eq!(test.len(), n_test);
    }

    #[test]
    fn split_is_a_seeded_partition() {
        let items: Vec<usize> = (0..50).collect();
        let (train, test) = train_test_split(&items, 0.3, 7);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, items);

        assert_eq!(train_test_split(&items, 0.3, 7), (train.clone(), test));
        assert_ne!(train_test_split(&items, 0.3, 8).0, train);
    }
}
