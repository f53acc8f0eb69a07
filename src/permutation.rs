//! Random node visiting orders

use rand::Rng;

/// Generate a random permutation of `0..n`
///
/// Each position is swapped with a uniformly drawn position, so the same
/// generator state always yields the same order.
pub fn generate_random_permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut permutation: Vec<usize> = (0..n).collect();
    for i in 0..n {
        let j = rng.gen_range(0..n);
        permutation.swap(i, j);
    }
    permutation
}
