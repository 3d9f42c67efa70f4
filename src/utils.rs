use num_bigint_dig::{BigUint, ModInverse};
use num_traits::ToPrimitive;
use rand::{seq::SliceRandom, Rng};

/// Reverses the lowest `bits` bits of `v`.
#[inline]
pub(crate) fn bit_reverse(v: usize, bits: usize) -> usize {
    if bits == 0 {
        return 0;
    }
    v.reverse_bits() >> (usize::BITS as usize - bits)
}

/// Bit-reversal permutation of 0..n for power-of-two n.
pub(crate) fn bit_reverse_order(n: usize) -> Vec<usize> {
    let bits = n.trailing_zeros() as usize;
    (0..n).map(|i| bit_reverse(i, bits)).collect()
}

/// a^-1 mod m, if it exists.
pub(crate) fn mod_inverse_u64(a: u64, m: u64) -> Option<u64> {
    let a = BigUint::from(a % m);
    let m = BigUint::from(m);
    (&a).mod_inverse(&m)?.to_u64()
}

/// Fills `out` with a ternary secret of exactly `hamming_weight` nonzero
/// coefficients, signs balanced.
pub(crate) fn fill_random_ternary_secret_with_hamming_weight<R: Rng>(
    out: &mut [i32],
    hamming_weight: usize,
    rng: &mut R,
) {
    assert!(hamming_weight <= out.len());
    out.fill(0);
    for i in 0..hamming_weight {
        out[i] = if i & 1 == 0 { 1 } else { -1 };
    }
    out.shuffle(rng);
}

/// Running mean / standard deviation accumulator used for noise accounting.
#[derive(Default, Clone)]
pub struct Stats {
    samples: Vec<f64>,
}

impl Stats {
    pub fn add_more(&mut self, values: &[i64]) {
        self.samples.extend(values.iter().map(|v| *v as f64));
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let m = self.mean();
        let var = self
            .samples
            .iter()
            .map(|v| (v - m) * (v - m))
            .sum::<f64>()
            / (self.samples.len() - 1) as f64;
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn bit_reverse_small() {
        assert_eq!(bit_reverse_order(8), vec![0, 4, 2, 6, 1, 5, 3, 7]);
        assert_eq!(bit_reverse(3, 4), 12);
    }

    #[test]
    fn mod_inverse_of_odd_elements_mod_power_of_two() {
        let two_n = 2048u64;
        for w in (1..two_n).step_by(2) {
            let inv = mod_inverse_u64(w, two_n).unwrap();
            assert_eq!((w as u128 * inv as u128) % two_n as u128, 1);
        }
        assert!(mod_inverse_u64(4, two_n).is_none());
    }

    #[test]
    fn ternary_secret_has_requested_weight() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(3);
        let mut s = vec![0i32; 256];
        fill_random_ternary_secret_with_hamming_weight(&mut s, 128, &mut rng);
        assert_eq!(s.iter().filter(|v| **v != 0).count(), 128);
        assert!(s.iter().all(|v| (-1..=1).contains(v)));
    }
}
