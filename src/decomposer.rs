/// Signed digit decomposition shared by the NGSW external product and the
/// LWE key switch.
pub trait Decomposer {
    type Element;
    fn base_log(&self) -> usize;
    fn decomposition_count(&self) -> usize;
    /// [1, B, B^2, ...] reduced mod q.
    fn gadget_vector(&self) -> Vec<Self::Element>;
    /// Writes the signed digits of `x` (a residue in [0, q)) into `out`,
    /// least significant first. Digits lie in [-B/2, B/2 - 1] and satisfy
    /// sum_j out[j] * B^j = x exactly as integers.
    fn decompose_into(&self, x: Self::Element, out: &mut [i64]);
}

/// Base-2^B decomposer with carry-propagating centered digits.
#[derive(Clone, Debug)]
pub struct SignedDecomposer {
    q: u64,
    base_log: usize,
    count: usize,
}

impl SignedDecomposer {
    /// Digit count is the smallest d for which the top digit always absorbs
    /// the worst-case carry, making the round trip exact over all of [0, q).
    pub fn new(q: u64, base_log: usize) -> Self {
        assert!(base_log >= 2 && base_log < 32);
        let half = 1u128 << (base_log - 1);
        let mut count = 1usize;
        loop {
            let shift = ((count - 1) * base_log).min(127);
            if ((q as u128 - 1) >> shift) + 1 < half {
                break;
            }
            count += 1;
        }
        SignedDecomposer {
            q,
            base_log,
            count,
        }
    }

    /// Same digit rule with a caller-chosen count; `count` must still give
    /// B^count >= 2q.
    pub fn with_count(q: u64, base_log: usize, count: usize) -> Self {
        let min = Self::new(q, base_log).count;
        assert!(count >= min, "digit count {count} cannot represent [0, {q})");
        SignedDecomposer {
            q,
            base_log,
            count,
        }
    }

    pub fn q(&self) -> u64 {
        self.q
    }
}

impl Decomposer for SignedDecomposer {
    type Element = u64;

    fn base_log(&self) -> usize {
        self.base_log
    }

    fn decomposition_count(&self) -> usize {
        self.count
    }

    fn gadget_vector(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.count);
        let mut pow = 1u128;
        for _ in 0..self.count {
            out.push((pow % self.q as u128) as u64);
            pow <<= self.base_log;
        }
        out
    }

    fn decompose_into(&self, x: u64, out: &mut [i64]) {
        debug_assert!(x < self.q);
        debug_assert!(out.len() == self.count);
        let base = 1i64 << self.base_log;
        let half = base >> 1;
        let mask = (base - 1) as u64;
        let mut rem = x;
        let mut carry = 0i64;
        for d in out.iter_mut() {
            let digit = (rem & mask) as i64 + carry;
            rem >>= self.base_log;
            if digit >= half {
                *d = digit - base;
                carry = 1;
            } else {
                *d = digit;
                carry = 0;
            }
        }
        debug_assert!(rem == 0 && carry == 0, "digit count too small for modulus");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn round_trip(dec: &SignedDecomposer, x: u64) {
        let mut digits = vec![0i64; dec.decomposition_count()];
        dec.decompose_into(x, &mut digits);
        let base = 1i128 << dec.base_log();
        let half = (base >> 1) as i64;
        let mut acc = 0i128;
        let mut pow = 1i128;
        for d in digits.iter() {
            assert!(*d >= -half && *d < half, "digit {d} out of range");
            acc += *d as i128 * pow;
            pow *= base;
        }
        assert_eq!(acc, x as i128);
    }

    #[test]
    fn round_trips_exactly_for_prime_modulus() {
        let dec = SignedDecomposer::new(995329, 2);
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(5);
        round_trip(&dec, 0);
        round_trip(&dec, 995328);
        round_trip(&dec, 995329 / 2);
        for _ in 0..2000 {
            round_trip(&dec, rng.gen_range(0..995329));
        }
    }

    #[test]
    fn key_switch_configuration_bounds_digits_by_half_base() {
        // B = 128, Q = 65537: every digit magnitude stays <= 64.
        let dec = SignedDecomposer::with_count(65537, 7, 4);
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(9);
        let mut digits = vec![0i64; dec.decomposition_count()];
        for _ in 0..4000 {
            let x = rng.gen_range(0..65537);
            dec.decompose_into(x, &mut digits);
            assert!(digits.iter().all(|d| d.unsigned_abs() <= 64));
            round_trip(&dec, x);
        }
    }

    #[test]
    fn gadget_vector_matches_base_powers() {
        let dec = SignedDecomposer::new(1 << 16, 7);
        let g = dec.gadget_vector();
        assert_eq!(g[0], 1);
        assert_eq!(g[1], 128);
        assert_eq!(g[2], 16384);
        assert_eq!(g.len(), dec.decomposition_count());
    }
}
