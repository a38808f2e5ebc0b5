//! Random selection without replacement

use rand::Rng;
use rand::seq::index;

/// Number of items selected for a fraction of `len`, rounded down
pub fn quota(len: usize, fraction: f64) -> usize {
    let n = (len as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
    n.min(len)
}

/// Pick `quota(len, fraction)` distinct indices in `0..len`, uniformly at random.
///
/// Cost scales with the number picked, not with `len`.
pub fn choose_fraction<R: Rng + ?Sized>(rng: &mut R, len: usize, fraction: f64) -> Vec<usize> {
    let amount = quota(len, fraction);
    if amount == 0 {
        return Vec::new();
    }
    index::sample(rng, len, amount).into_vec()
}
