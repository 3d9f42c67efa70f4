//! Full bootstrap pipelines: blind rotation, LWE key switch and modulus
//! switch composed into single-precision and tree (base-p digit) refreshes.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lwe::{lwe_key_switch, lwe_modulus_switch, LweCiphertext, LweKeySwitchKey};
use crate::ntru::NtruCiphertext;
use crate::parameters::LweParameters;
use crate::pbs::{BlindRotationEvaluator, BlindRotationKeySet, MemBlindRotationKeySet};
use crate::ring::Poly;

/// Bundles the rotation evaluator with the key material needed to return to
/// the starting LWE parameters. Keys are shared; scratch is per instance.
pub struct Bootstrapper {
    lwe_params: LweParameters,
    ks_params: LweParameters,
    eval: BlindRotationEvaluator,
    brk: Arc<MemBlindRotationKeySet>,
    lksk: Arc<LweKeySwitchKey>,
    test_poly: Poly,
}

impl Bootstrapper {
    pub fn new(
        eval: BlindRotationEvaluator,
        brk: Arc<MemBlindRotationKeySet>,
        lksk: Arc<LweKeySwitchKey>,
        test_poly: Poly,
    ) -> Result<Self> {
        let lwe_params = *eval.lwe_params();
        let ks_params = *lksk.params();
        if ks_params.n() != lwe_params.n() || ks_params.p() != lwe_params.p() {
            return Err(Error::InvalidParameter(
                "key switch parameters disagree with the rotation parameters".into(),
            ));
        }
        if brk.len() != lwe_params.n() + 2 {
            return Err(Error::InvalidParameter(format!(
                "blind rotation key set holds {} entries, expected n + 2 = {}",
                brk.len(),
                lwe_params.n() + 2
            )));
        }
        Ok(Bootstrapper {
            lwe_params,
            ks_params,
            eval,
            brk,
            lksk,
            test_poly,
        })
    }

    pub fn lwe_params(&self) -> &LweParameters {
        &self.lwe_params
    }

    /// Key switch back to s, then modulus switch back to q.
    fn refresh(&self, acc: &NtruCiphertext) -> Result<LweCiphertext> {
        let ring = self.eval.params().ring();
        let ks = lwe_key_switch(acc, ring, &self.lksk)?;
        Ok(lwe_modulus_switch(
            &ks,
            self.ks_params.q(),
            self.lwe_params.q(),
        ))
    }

    /// Single-precision bootstrap: refreshes `ct` while applying the
    /// configured test polynomial to its message.
    pub fn bootstrap(&mut self, ct: &LweCiphertext) -> Result<LweCiphertext> {
        let acc = self.eval.blind_rotate(ct, &self.test_poly, self.brk.as_ref())?;
        self.refresh(&acc)
    }

    /// Tree bootstrap over base-p digits (high digit first).
    ///
    /// The high digit drives one multi-value rotation producing both its
    /// refreshed output and the encrypted family of low-digit test
    /// polynomials selected by it; each low digit is then rotated against
    /// the combined encrypted test polynomial.
    pub fn bootstrap_tree(
        &mut self,
        digits: &[LweCiphertext],
        f_high: &Poly,
        f_low: &[Poly],
    ) -> Result<Vec<LweCiphertext>> {
        assert!(!digits.is_empty());
        let p = self.lwe_params.p() as usize;
        assert!(f_low.len() == p, "need one low-digit table per residue");

        let (acc_high, family) =
            self.eval
                .multi_value_blind_rotate(&digits[0], f_high, f_low, self.brk.as_ref())?;

        let mut out = Vec::with_capacity(digits.len());
        out.push(self.refresh(&acc_high)?);

        if digits.len() > 1 {
            let enc_tp = self.eval.combine_test_polynomials(family, p)?;
            for low in &digits[1..] {
                let acc = self
                    .eval
                    .blind_rotate_encrypted(low, &enc_tp, self.brk.as_ref())?;
                out.push(self.refresh(&acc)?);
            }
        }

        Ok(out)
    }

    pub fn shallow_copy(&self) -> Self {
        Bootstrapper {
            lwe_params: self.lwe_params,
            ks_params: self.ks_params,
            eval: self.eval.shallow_copy(),
            brk: self.brk.clone(),
            lksk: self.lksk.clone(),
            test_poly: self.test_poly.clone(),
        }
    }
}

/// Base-p digits of m, most significant first, zero-padded to d digits.
pub fn decompose_digits(m: u64, p: u64, d: usize) -> Vec<u64> {
    let mut digits = vec![0u64; d];
    let mut num = m;
    let mut idx = 0;
    while num != 0 {
        debug_assert!(idx < d, "message does not fit in {d} base-{p} digits");
        digits[idx] = num % p;
        num /= p;
        idx += 1;
    }
    digits.reverse();
    digits
}

/// Folds base-p digits (most significant first) back into an integer.
pub fn recompose_digits(digits: &[u64], p: u64) -> u64 {
    digits.iter().fold(0, |acc, d| acc * p + d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_decomposition_round_trips() {
        for (m, p, d) in [(200_000u64, 16u64, 5usize), (0, 16, 4), (65535, 16, 4), (7, 4, 2)] {
            let digits = decompose_digits(m, p, d);
            assert_eq!(digits.len(), d);
            assert!(digits.iter().all(|v| *v < p));
            assert_eq!(recompose_digits(&digits, p), m);
        }
    }

    #[test]
    fn high_digit_comes_first() {
        assert_eq!(decompose_digits(0x1234, 16, 4), vec![1, 2, 3, 4]);
    }
}
