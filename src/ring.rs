use itertools::izip;
use num_bigint_dig::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::backend::{ArithmeticOps, ModInit, ModularOpsU64, Modulus, VectorOps};
use crate::error::{Error, Result};
use crate::ntt::{Ntt, NttBackendU64, NttInit};
use crate::utils::bit_reverse;

/// Polynomial over the residue ring chain: one fully reduced coefficient row
/// per chain prime. Whether the rows are in coefficient or evaluation (NTT)
/// representation is tracked by the owning ciphertext, not the polynomial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poly {
    pub(crate) coeffs: Vec<Vec<u64>>,
}

impl Poly {
    pub(crate) fn zero(chain_len: usize, n: usize) -> Self {
        Poly {
            coeffs: vec![vec![0u64; n]; chain_len],
        }
    }

    pub fn chain_len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn n(&self) -> usize {
        self.coeffs[0].len()
    }

    pub fn row(&self, i: usize) -> &[u64] {
        &self.coeffs[i]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [u64] {
        &mut self.coeffs[i]
    }

    pub fn copy_from(&mut self, other: &Poly) {
        debug_assert!(self.chain_len() == other.chain_len() && self.n() == other.n());
        izip!(self.coeffs.iter_mut(), other.coeffs.iter())
            .for_each(|(a, b)| a.copy_from_slice(b));
    }

    pub fn set_zero(&mut self) {
        self.coeffs.iter_mut().for_each(|r| r.fill(0));
    }
}

pub struct SubRing {
    pub(crate) modop: ModularOpsU64,
    pub(crate) nttop: NttBackendU64,
    pub(crate) q: u64,
}

/// Negacyclic ring Z_Q[X]/(X^N + 1) with Q a chain of NTT-friendly primes.
///
/// Every operation takes and returns fully reduced rows; NTT-domain inputs
/// are required where the method name says so. Automorphisms in the NTT
/// domain are pure slot permutations (slot i holds the evaluation at
/// psi^{2*bitrev(i)+1}).
pub struct RingQ {
    n: usize,
    log_n: usize,
    subrings: Vec<SubRing>,
    q_total: BigUint,
    crt_weights: Vec<BigUint>,
}

impl RingQ {
    pub fn new(n: usize, moduli: &[u64]) -> Result<Self> {
        if !n.is_power_of_two() || n < 8 {
            return Err(Error::InvalidParameter(format!(
                "ring degree {n} must be a power of two >= 8"
            )));
        }
        if moduli.is_empty() {
            return Err(Error::InvalidParameter("empty moduli chain".into()));
        }
        let two_n = 2 * n as u64;
        for qi in moduli {
            if (*qi - 1) % two_n != 0 {
                return Err(Error::InvalidParameter(format!(
                    "modulus {qi} is not 1 mod 2N"
                )));
            }
            if !num_bigint_dig::prime::probably_prime(&BigUint::from(*qi), 20) {
                return Err(Error::InvalidParameter(format!("modulus {qi} is not prime")));
            }
        }

        let subrings = moduli
            .iter()
            .map(|qi| SubRing {
                modop: ModularOpsU64::new(*qi),
                nttop: NttBackendU64::new(*qi, n),
                q: *qi,
            })
            .collect::<Vec<_>>();

        // CRT lift weights: w_i = (Q/q_i) * ((Q/q_i)^-1 mod q_i)
        let q_total = moduli
            .iter()
            .fold(BigUint::from(1u64), |acc, qi| acc * BigUint::from(*qi));
        let crt_weights = moduli
            .iter()
            .map(|qi| {
                let star = &q_total / BigUint::from(*qi);
                let tilde = (&star % BigUint::from(*qi))
                    .to_u64()
                    .expect("residue fits the prime it was reduced by");
                let tilde_inv = crate::utils::mod_inverse_u64(tilde, *qi)
                    .expect("chain primes are pairwise coprime");
                (star * BigUint::from(tilde_inv)) % &q_total
            })
            .collect();

        Ok(RingQ {
            n,
            log_n: n.trailing_zeros() as usize,
            subrings,
            q_total,
            crt_weights,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn log_n(&self) -> usize {
        self.log_n
    }

    pub fn chain_len(&self) -> usize {
        self.subrings.len()
    }

    pub fn moduli(&self) -> Vec<u64> {
        self.subrings.iter().map(|s| s.q).collect()
    }

    pub fn subrings(&self) -> &[SubRing] {
        &self.subrings
    }

    pub fn modulus_big(&self) -> &BigUint {
        &self.q_total
    }

    pub fn new_poly(&self) -> Poly {
        Poly::zero(self.chain_len(), self.n)
    }

    pub fn ntt(&self, p: &mut Poly) {
        izip!(self.subrings.iter(), p.coeffs.iter_mut())
            .for_each(|(s, row)| s.nttop.forward(row));
    }

    pub fn intt(&self, p: &mut Poly) {
        izip!(self.subrings.iter(), p.coeffs.iter_mut())
            .for_each(|(s, row)| s.nttop.backward(row));
    }

    pub fn add_assign(&self, a: &mut Poly, b: &Poly) {
        izip!(self.subrings.iter(), a.coeffs.iter_mut(), b.coeffs.iter())
            .for_each(|(s, ar, br)| s.modop.elwise_add_mut(ar, br));
    }

    pub fn sub_assign(&self, a: &mut Poly, b: &Poly) {
        izip!(self.subrings.iter(), a.coeffs.iter_mut(), b.coeffs.iter())
            .for_each(|(s, ar, br)| s.modop.elwise_sub_mut(ar, br));
    }

    pub fn neg_assign(&self, a: &mut Poly) {
        izip!(self.subrings.iter(), a.coeffs.iter_mut())
            .for_each(|(s, ar)| s.modop.elwise_neg_mut(ar));
    }

    /// Pointwise product; both operands in NTT form.
    pub fn mul_assign(&self, a: &mut Poly, b: &Poly) {
        izip!(self.subrings.iter(), a.coeffs.iter_mut(), b.coeffs.iter())
            .for_each(|(s, ar, br)| s.modop.elwise_mul_mut(ar, br));
    }

    pub fn mul_into(&self, a: &Poly, b: &Poly, out: &mut Poly) {
        out.copy_from(a);
        self.mul_assign(out, b);
    }

    /// Multiplies every row by `s` reduced into the row's modulus.
    pub fn scalar_mul_assign(&self, a: &mut Poly, s: u64) {
        izip!(self.subrings.iter(), a.coeffs.iter_mut()).for_each(|(sr, row)| {
            let si = s % sr.q;
            sr.modop.elwise_scalar_mul_mut(row, &si);
        });
    }

    /// Per-prime scalar multiplication.
    pub fn scalar_mul_rows_assign(&self, a: &mut Poly, s: &[u64]) {
        debug_assert!(s.len() == self.chain_len());
        izip!(self.subrings.iter(), a.coeffs.iter_mut(), s.iter())
            .for_each(|(sr, row, si)| sr.modop.elwise_scalar_mul_mut(row, si));
    }

    /// v^-1 mod q_i for every chain prime.
    pub fn inv_mod_chain(&self, v: u64) -> Vec<u64> {
        self.subrings
            .iter()
            .map(|s| {
                crate::utils::mod_inverse_u64(v % s.q, s.q)
                    .expect("chain moduli are prime and v is nonzero mod each of them")
            })
            .collect()
    }

    /// Slot permutation table for the automorphism X -> X^k in the NTT
    /// domain; `k` must be odd.
    pub fn automorphism_index(&self, gal_el: u64) -> Vec<u32> {
        assert!(gal_el & 1 == 1, "galois element {gal_el} must be odd");
        let two_n = 2 * self.n as u64;
        let mask = two_n - 1;
        (0..self.n)
            .map(|j| {
                let e = (2 * bit_reverse(j, self.log_n) as u64 + 1) & mask;
                let t = gal_el.wrapping_mul(e) & mask;
                bit_reverse(((t - 1) >> 1) as usize, self.log_n) as u32
            })
            .collect()
    }

    /// Applies the slot permutation of a precomputed automorphism index.
    /// Input must be in NTT form.
    pub fn automorphism_ntt_into(&self, src: &Poly, index: &[u32], out: &mut Poly) {
        debug_assert!(index.len() == self.n);
        izip!(src.coeffs.iter(), out.coeffs.iter_mut()).for_each(|(s, o)| {
            izip!(o.iter_mut(), index.iter()).for_each(|(oi, idx)| *oi = s[*idx as usize]);
        });
    }

    pub fn automorphism_ntt(&self, src: &Poly, gal_el: u64, out: &mut Poly) {
        if gal_el == 1 {
            out.copy_from(src);
            return;
        }
        let index = self.automorphism_index(gal_el);
        self.automorphism_ntt_into(src, &index, out);
    }

    /// X^exp in coefficient form, exp taken mod 2N with the negacyclic sign.
    pub fn new_monomial(&self, exp: i64) -> Poly {
        let two_n = 2 * self.n as i64;
        let e = exp.rem_euclid(two_n) as usize;
        let mut p = self.new_poly();
        if e < self.n {
            p.coeffs.iter_mut().for_each(|row| row[e] = 1);
        } else {
            izip!(self.subrings.iter(), p.coeffs.iter_mut())
                .for_each(|(s, row)| row[e - self.n] = s.q - 1);
        }
        p
    }

    /// Multiplies a coefficient-form polynomial by X^k (any sign of k).
    pub fn mul_by_monomial_into(&self, src: &Poly, k: i64, out: &mut Poly) {
        let two_n = 2 * self.n as i64;
        let k = k.rem_euclid(two_n) as usize;
        out.set_zero();
        for (s, (src_row, out_row)) in self
            .subrings
            .iter()
            .zip(izip!(src.coeffs.iter(), out.coeffs.iter_mut()))
        {
            for i in 0..self.n {
                let mut to = i + k;
                let mut negate = false;
                if to >= 2 * self.n {
                    to -= 2 * self.n;
                }
                if to >= self.n {
                    to -= self.n;
                    negate = true;
                }
                out_row[to] = if negate {
                    ArithmeticOps::neg(&s.modop, &src_row[i])
                } else {
                    src_row[i]
                };
            }
        }
    }

    pub fn mul_by_monomial_assign(&self, p: &mut Poly, k: i64) {
        let mut out = self.new_poly();
        self.mul_by_monomial_into(p, k, &mut out);
        *p = out;
    }

    /// Lifts a signed coefficient vector into the chain.
    pub fn poly_from_signed(&self, vals: &[i64]) -> Poly {
        debug_assert!(vals.len() == self.n);
        let mut p = self.new_poly();
        izip!(self.subrings.iter(), p.coeffs.iter_mut()).for_each(|(s, row)| {
            izip!(row.iter_mut(), vals.iter())
                .for_each(|(ri, v)| *ri = s.modop.map_i64_to_element(*v));
        });
        p
    }

    /// CRT lift of a coefficient-form polynomial to [0, Q).
    pub fn to_biguint(&self, p: &Poly) -> Vec<BigUint> {
        if self.chain_len() == 1 {
            return p.coeffs[0].iter().map(|c| BigUint::from(*c)).collect();
        }
        (0..self.n)
            .map(|i| {
                let mut acc = BigUint::zero();
                for (row, w) in izip!(p.coeffs.iter(), self.crt_weights.iter()) {
                    acc += BigUint::from(row[i]) * w;
                }
                acc % &self.q_total
            })
            .collect()
    }

    /// Centered CRT lift; coefficients must fit in i64 after centering
    /// (used for secrets and small noise polynomials).
    pub fn to_centered_i64(&self, p: &Poly) -> Vec<i64> {
        if self.chain_len() == 1 {
            let op = &self.subrings[0].modop;
            return p.coeffs[0].iter().map(|c| op.map_element_to_i64(*c)).collect();
        }
        let half = &self.q_total >> 1;
        self.to_biguint(p)
            .into_iter()
            .map(|v| {
                if v > half {
                    -((&self.q_total - v).to_i64().expect("centered value fits i64"))
                } else {
                    v.to_i64().expect("centered value fits i64")
                }
            })
            .collect()
    }

    /// round(x * target / Q) mod target for every coefficient of a
    /// coefficient-form polynomial; the modulus-switch rounding rule shared
    /// by all coordinates.
    pub fn scale_coeffs_to(&self, p: &Poly, target: u64) -> Vec<u64> {
        let half = &self.q_total >> 1;
        self.to_biguint(p)
            .into_iter()
            .map(|v| {
                let scaled = (v * BigUint::from(target) + &half) / &self.q_total;
                (scaled % BigUint::from(target)).to_u64().unwrap()
            })
            .collect()
    }

    /// NTT-domain table of X^{2^i} for i in 0..log N.
    pub fn gen_x_pow_2(&self) -> Vec<Poly> {
        (0..self.log_n)
            .map(|i| {
                let mut p = self.new_monomial(1i64 << i);
                self.ntt(&mut p);
                p
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn test_ring() -> RingQ {
        RingQ::new(256, &[995329]).unwrap()
    }

    fn random_poly(ring: &RingQ, rng: &mut impl Rng) -> Poly {
        let mut p = ring.new_poly();
        for (s, row) in izip!(ring.subrings.iter(), p.coeffs.iter_mut()) {
            row.iter_mut().for_each(|v| *v = rng.gen_range(0..s.q));
        }
        p
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(RingQ::new(100, &[995329]).is_err());
        assert!(RingQ::new(256, &[995330]).is_err());
        assert!(RingQ::new(256, &[]).is_err());
    }

    #[test]
    fn automorphism_in_ntt_matches_coefficient_domain() {
        let ring = test_ring();
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(17);
        let p = random_poly(&ring, &mut rng);
        let n = ring.n();
        let two_n = 2 * n;

        for k in [3u64, 5, 31, (2 * n as u64) - 1] {
            // coefficient-domain reference: X^i -> X^{ik mod 2N} with sign
            let mut want = ring.new_poly();
            for i in 0..n {
                let to = (i * k as usize) % two_n;
                for (s, (src_row, w_row)) in ring
                    .subrings
                    .iter()
                    .zip(izip!(p.coeffs.iter(), want.coeffs.iter_mut()))
                {
                    if to < n {
                        w_row[to] = src_row[i];
                    } else {
                        w_row[to - n] = ArithmeticOps::neg(&s.modop, &src_row[i]);
                    }
                }
            }

            let mut got = p.clone();
            ring.ntt(&mut got);
            let mut out = ring.new_poly();
            ring.automorphism_ntt(&got, k, &mut out);
            ring.intt(&mut out);
            assert_eq!(out, want, "automorphism by {k}");
        }
    }

    #[test]
    fn automorphism_composition() {
        let ring = test_ring();
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(23);
        let mut p = random_poly(&ring, &mut rng);
        ring.ntt(&mut p);

        let two_n = 2 * ring.n() as u64;
        let (k1, k2) = (5u64, 9u64);
        let mut tmp = ring.new_poly();
        let mut seq = ring.new_poly();
        ring.automorphism_ntt(&p, k2, &mut tmp);
        ring.automorphism_ntt(&tmp, k1, &mut seq);

        let mut direct = ring.new_poly();
        ring.automorphism_ntt(&p, (k1 * k2) % two_n, &mut direct);
        assert_eq!(seq, direct);
    }

    #[test]
    fn monomial_multiplication_wraps_with_sign() {
        let ring = test_ring();
        let n = ring.n();
        let q = ring.subrings[0].q;
        let mut p = ring.new_poly();
        p.coeffs[0][1] = 7;

        let mut out = ring.new_poly();
        ring.mul_by_monomial_into(&p, (n - 1) as i64, &mut out);
        // X * X^{n-1} = X^n = -1
        assert_eq!(out.coeffs[0][0], q - 7);

        ring.mul_by_monomial_into(&p, -1, &mut out);
        assert_eq!(out.coeffs[0][0], 7);

        // multiplying by X^{2N} is the identity
        ring.mul_by_monomial_into(&p, 2 * n as i64, &mut out);
        assert_eq!(out, p);
    }

    #[test]
    fn ntt_mul_matches_monomial_shift() {
        let ring = test_ring();
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(29);
        let p = random_poly(&ring, &mut rng);

        let mut want = ring.new_poly();
        ring.mul_by_monomial_into(&p, 5, &mut want);

        let mut a = p.clone();
        ring.ntt(&mut a);
        let mut m = ring.new_monomial(5);
        ring.ntt(&mut m);
        ring.mul_assign(&mut a, &m);
        ring.intt(&mut a);
        assert_eq!(a, want);
    }

    #[test]
    fn crt_lift_round_trips() {
        let ring = RingQ::new(16, &[97, 193]).unwrap();
        let signed: Vec<i64> = vec![-3, -2, -1, 0, 1, 2, 3, 4, 5, -5, 0, 0, 1, -1, 2, -2];
        let p = ring.poly_from_signed(&signed);
        assert_eq!(ring.to_centered_i64(&p), signed);
    }

    #[test]
    fn scaling_rounds_to_nearest() {
        let ring = test_ring();
        let mut p = ring.new_poly();
        let q = ring.subrings[0].q;
        p.coeffs[0][0] = q / 2;
        p.coeffs[0][1] = 0;
        p.coeffs[0][2] = q - 1;
        let scaled = ring.scale_coeffs_to(&p, 1 << 10);
        assert_eq!(scaled[0], 1 << 9);
        assert_eq!(scaled[1], 0);
        assert_eq!(scaled[2], 0); // q-1 rounds up to the modulus, wraps to 0
    }
}
