//! Blind rotation: homomorphic evaluation of X^{<a,s> - b} applied to a
//! test polynomial, carried on an NTRU accumulator.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lwe::{LweCiphertext, LweSecret};
use crate::ngsw::{NgswCiphertext, NgswEncryptor, NgswEvaluator};
use crate::ntru::{NtruCiphertext, NtruSecretKey};
use crate::parameters::{LweParameters, RingParameters};
use crate::ring::{Poly, RingQ};
use crate::utils::mod_inverse_u64;

/// Access to the blind-rotation key material.
///
/// Layout of a key set for LWE dimension n:
/// - `0..n`: NGSW(X^{s_i}); entry 0 additionally carries the factor f^-1 so
///   the plaintext accumulator becomes a ciphertext on first contact;
/// - `n`: NGSW(X^{-sum s_i}), the closing correction;
/// - `n+1`: NGSW(X^{s_0}) without the f^-1 factor, used when the test
///   polynomial is itself encrypted.
pub trait BlindRotationKeySet {
    fn blind_rotation_key(&self, i: usize) -> Result<&NgswCiphertext>;
    fn len(&self) -> usize;
}

/// In-memory key set; generated once, read-only afterwards.
pub struct MemBlindRotationKeySet {
    keys: Vec<NgswCiphertext>,
}

impl BlindRotationKeySet for MemBlindRotationKeySet {
    fn blind_rotation_key(&self, i: usize) -> Result<&NgswCiphertext> {
        self.keys.get(i).ok_or(Error::BlindRotationKeyMissing {
            index: i,
            len: self.keys.len(),
        })
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Generates the n+2 NGSW ciphertexts of a blind-rotation key set from the
/// LWE secret. `ngsw_enc` must encrypt under f^-1.
pub fn gen_blind_rotation_key(
    lwe_sk: &LweSecret,
    lwe_params: &LweParameters,
    ngsw_enc: &mut NgswEncryptor,
    f_inv: &NtruSecretKey,
) -> MemBlindRotationKeySet {
    let params = ngsw_enc.params().clone();
    let ring = params.ring();
    let n = lwe_params.n();
    let two_n = 2 * ring.n() as i64;

    let mut keys = Vec::with_capacity(n + 2);
    let mut s_sum: i64 = 0;

    for (i, s_i) in lwe_sk.values()[..n].iter().enumerate() {
        let s_i = *s_i as i64;
        s_sum -= s_i;

        let pt = if i == 0 {
            // fold f^-1 into the first key so the initial plaintext
            // accumulator absorbs the scaling
            let mut f_inv_coeff = f_inv.value.clone();
            ring.intt(&mut f_inv_coeff);
            let mut pt = ring.new_poly();
            ring.mul_by_monomial_into(&f_inv_coeff, s_i, &mut pt);
            ring.ntt(&mut pt);
            pt
        } else {
            let mut pt = ring.new_monomial(s_i);
            ring.ntt(&mut pt);
            pt
        };
        keys.push(ngsw_enc.encrypt_new(Some(&pt)));
    }

    let mut closing = ring.new_monomial(s_sum.rem_euclid(two_n));
    ring.ntt(&mut closing);
    keys.push(ngsw_enc.encrypt_new(Some(&closing)));

    let mut first_plain = ring.new_monomial(lwe_sk.values()[0] as i64);
    ring.ntt(&mut first_plain);
    keys.push(ngsw_enc.encrypt_new(Some(&first_plain)));

    MemBlindRotationKeySet { keys }
}

/// Rotation evaluator. Owns the accumulator scratch; shares parameters and
/// galois keys through the embedded NGSW evaluator.
pub struct BlindRotationEvaluator {
    params: Arc<RingParameters>,
    lwe_params: LweParameters,
    ngsw: NgswEvaluator,
    acc: NtruCiphertext,
}

impl BlindRotationEvaluator {
    /// `lwe_params.q()` must equal the ring degree N so LWE coordinates
    /// index ring exponents directly.
    pub fn new(lwe_params: LweParameters, ngsw: NgswEvaluator) -> Result<Self> {
        let params = ngsw.params().clone();
        if lwe_params.q() != params.n() as u64 {
            return Err(Error::InvalidParameter(format!(
                "lwe modulus {} must equal ring degree {} at the rotation boundary",
                lwe_params.q(),
                params.n()
            )));
        }
        let acc = NtruCiphertext::new(&params, 1);
        Ok(BlindRotationEvaluator {
            params,
            lwe_params,
            ngsw,
            acc,
        })
    }

    pub fn params(&self) -> &Arc<RingParameters> {
        &self.params
    }

    pub fn lwe_params(&self) -> &LweParameters {
        &self.lwe_params
    }

    pub fn ngsw(&mut self) -> &mut NgswEvaluator {
        &mut self.ngsw
    }

    pub fn shallow_copy(&self) -> Self {
        BlindRotationEvaluator {
            params: self.params.clone(),
            lwe_params: self.lwe_params,
            ngsw: self.ngsw.shallow_copy(),
            acc: NtruCiphertext::new(&self.params, 1),
        }
    }

    /// Per-coordinate odd twists w_i = 2 a_i + 1 and their inverses mod 2N;
    /// w_inv[n] = 1 closes the schedule.
    fn rotation_schedule(&self, a: &[u64]) -> (Vec<u64>, Vec<u64>) {
        let two_n = 2 * self.params.n() as u64;
        let n = a.len();
        let mut w = vec![0u64; n];
        let mut w_inv = vec![0u64; n + 1];
        for i in 0..n {
            w[i] = (2 * a[i] + 1) % two_n;
            w_inv[i] = mod_inverse_u64(w[i], two_n)
                .expect("odd elements are invertible mod a power of two");
        }
        w_inv[n] = 1;
        (w, w_inv)
    }

    fn run_rotation_loop(
        &mut self,
        w: &[u64],
        w_inv: &[u64],
        brk: &impl BlindRotationKeySet,
        encrypted_tp: bool,
    ) -> Result<()> {
        let two_n = 2 * self.params.n() as u64;
        let n = w.len();
        for i in 0..n {
            let key_index = if encrypted_tp && i == 0 { n + 1 } else { i };
            let key = brk.blind_rotation_key(key_index)?;
            self.ngsw.external_product(&mut self.acc, key)?;

            let exp = (w[i] * w_inv[i + 1]) % two_n;
            if exp != 1 {
                self.ngsw.automorphism(&mut self.acc, exp)?;
            }
        }
        let closing = brk.blind_rotation_key(n)?;
        self.ngsw.external_product(&mut self.acc, closing)
    }

    /// Loads the plaintext test polynomial into the accumulator, twisted by
    /// w_0^-1 and shifted by X^{-2 b w_0^-1}.
    fn load_test_polynomial(&mut self, test_poly: &Poly, b: u64, w_inv0: u64) {
        let ring = self.params.ring();
        let two_n = 2 * ring.n() as i64;

        ring.automorphism_ntt(test_poly, w_inv0, &mut self.acc.value[1]);
        ring.intt(&mut self.acc.value[1]);
        let k = (-2 * b as i64 * w_inv0 as i64).rem_euclid(two_n);
        ring.mul_by_monomial_assign(&mut self.acc.value[1], k);
        ring.ntt(&mut self.acc.value[1]);
        self.acc.value[0].set_zero();
        self.acc.is_ntt = true;
    }

    /// Single-value blind rotation. The constant coefficient of the result
    /// decrypts to round(Q/2p) * TP((<a,s> - b) mod 2N).
    pub fn blind_rotate(
        &mut self,
        ct: &LweCiphertext,
        test_poly: &Poly,
        brk: &impl BlindRotationKeySet,
    ) -> Result<NtruCiphertext> {
        let (w, w_inv) = self.rotation_schedule(&ct.a);
        self.load_test_polynomial(test_poly, ct.b, w_inv[0]);
        self.run_rotation_loop(&w, &w_inv, brk, false)?;
        Ok(self.acc.clone())
    }

    /// Multi-value variant: rotates the canonical base polynomial once and
    /// selects each requested function afterwards by multiplying with its
    /// convert polynomial. Returns the rotation of `test_poly` plus one
    /// ciphertext per entry of `multi_polys`, amortising the loop across
    /// the whole family.
    pub fn multi_value_blind_rotate(
        &mut self,
        ct: &LweCiphertext,
        test_poly: &Poly,
        multi_polys: &[Poly],
        brk: &impl BlindRotationKeySet,
    ) -> Result<(NtruCiphertext, Vec<NtruCiphertext>)> {
        let ring = self.params.ring_arc();
        let base_poly = init_multi_value_base_poly(self.lwe_params.p(), &ring);

        let (w, w_inv) = self.rotation_schedule(&ct.a);
        self.load_test_polynomial(&base_poly, ct.b, w_inv[0]);
        self.run_rotation_loop(&w, &w_inv, brk, false)?;

        let conv = convert_test_poly(test_poly, &ring);
        let mut res = self.acc.clone();
        ring.mul_assign(&mut res.value[1], &conv);
        res.value[0].set_zero();

        let multi = multi_polys
            .iter()
            .map(|f| {
                let conv = convert_test_poly(f, &ring);
                let mut r = self.acc.clone();
                ring.mul_assign(&mut r.value[1], &conv);
                r
            })
            .collect();

        Ok((res, multi))
    }

    /// Encrypted-test-polynomial variant: the initial twist is applied
    /// homomorphically and the first loop step uses the key without the
    /// f^-1 factor, since the test polynomial already carries it.
    pub fn blind_rotate_encrypted(
        &mut self,
        ct: &LweCiphertext,
        test_poly: &NtruCiphertext,
        brk: &impl BlindRotationKeySet,
    ) -> Result<NtruCiphertext> {
        if !test_poly.is_ntt {
            return Err(Error::FormatMismatch {
                op: "blind_rotate_encrypted",
                expected: "NTT",
            });
        }
        let ring = self.params.ring_arc();
        let two_n = 2 * ring.n() as i64;
        let (w, w_inv) = self.rotation_schedule(&ct.a);

        self.acc.copy_from(test_poly);
        if w_inv[0] != 1 {
            self.ngsw.automorphism(&mut self.acc, w_inv[0])?;
        }
        ring.intt(&mut self.acc.value[1]);
        let k = (-2 * ct.b as i64 * w_inv[0] as i64).rem_euclid(two_n);
        ring.mul_by_monomial_assign(&mut self.acc.value[1], k);
        ring.ntt(&mut self.acc.value[1]);

        self.run_rotation_loop(&w, &w_inv, brk, true)?;
        Ok(self.acc.clone())
    }

    /// Passthrough to the NGSW combiner: merges the multi-value family into
    /// one encrypted test polynomial.
    pub fn combine_test_polynomials(
        &mut self,
        cts: Vec<NtruCiphertext>,
        p: usize,
    ) -> Result<NtruCiphertext> {
        self.ngsw.combine_test_polynomials(cts, p)
    }
}

fn delta_for(q_i: u64, p: u64) -> u64 {
    // round(q_i / 2p)
    (q_i + p) / (2 * p)
}

/// Identity test polynomial: coefficient 2k holds round(Q/2p) * (k / delta)
/// so rotation by an encoded m lands the scaled m in the constant slot.
/// Test polynomials live only at even exponents; the odd exponents flip
/// sign under rotation by odd twists.
pub fn init_identity_test_poly(lwe: &LweParameters, ring: &RingQ) -> Poly {
    let mut f = ring.new_poly();
    let n = ring.n();
    let step = lwe.delta();
    for (sub, row) in ring.subrings().iter().zip(f.coeffs.iter_mut()) {
        let scale = delta_for(sub.q, lwe.p());
        for i in 0..n / 2 {
            row[2 * i] = (scale * (i as u64 / step)) % sub.q;
        }
    }
    ring.ntt(&mut f);
    f
}

/// ReLU tables for the tree bootstrap, raw-valued: the multi-value base
/// polynomial carries the round(Q/2p) scale for them.
///
/// F_high(x) = x for x < p/2 else 0; F_low[k](x) = k for x < p/2 else 0.
pub fn init_relu_test_polys(lwe: &LweParameters, ring: &RingQ) -> (Poly, Vec<Poly>) {
    let n = ring.n();
    let p = lwe.p();
    let step = lwe.delta();

    let mut f_high = ring.new_poly();
    for row in f_high.coeffs.iter_mut() {
        for i in 0..n / 2 {
            let m = i as u64 / step;
            row[2 * i] = if m < p / 2 { m } else { 0 };
        }
    }
    ring.ntt(&mut f_high);

    let f_low = (0..p)
        .map(|k| {
            let mut f = ring.new_poly();
            for row in f.coeffs.iter_mut() {
                for i in 0..n / 2 {
                    let m = i as u64 / step;
                    row[2 * i] = if m < p / 2 { k } else { 0 };
                }
            }
            ring.ntt(&mut f);
            f
        })
        .collect();

    (f_high, f_low)
}

/// Canonical multi-value base polynomial
/// (Q+1)/2 * (1 + X^2 + ... + X^{N-2}) * round(Q/2p).
pub fn init_multi_value_base_poly(p: u64, ring: &RingQ) -> Poly {
    let mut f = ring.new_poly();
    let n = ring.n();
    for (sub, row) in ring.subrings().iter().zip(f.coeffs.iter_mut()) {
        let two_inv = (sub.q + 1) / 2;
        let v = ((two_inv as u128 * delta_for(sub.q, p) as u128) % sub.q as u128) as u64;
        for i in 0..n / 2 {
            row[2 * i] = v;
        }
    }
    ring.ntt(&mut f);
    f
}

/// Inverts the geometric sum of the base polynomial for one function table:
/// differences of consecutive even coefficients, with the negacyclic wrap
/// folded into the constant term. Multiplying the rotated base polynomial
/// by this selects the function.
pub fn convert_test_poly(f: &Poly, ring: &RingQ) -> Poly {
    let n = ring.n();
    let mut coeff = f.clone();
    ring.intt(&mut coeff);

    let mut conv = ring.new_poly();
    for (u, sub) in ring.subrings().iter().enumerate() {
        let src = coeff.row(u);
        let out = conv.row_mut(u);
        out[0] = (src[0] + src[n - 2]) % sub.q;
        for i in 1..n / 2 {
            let d = src[2 * i] as i64 - src[2 * i - 2] as i64;
            out[2 * i] = d.rem_euclid(sub.q as i64) as u64;
        }
    }
    ring.ntt(&mut conv);
    conv
}
