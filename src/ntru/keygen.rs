use std::sync::Arc;

use crate::backend::{ArithmeticOps, ModularOpsU64, Modulus, VectorOps};
use crate::error::{Error, Result};
use crate::ntru::{NtruSecretKey, NtruSecretPair};
use crate::parameters::RingParameters;
use crate::random::{sample_distribution_i64, DefaultSecureRng};
use crate::utils::{mod_inverse_u64, Stats};

pub struct NtruKeyGenerator {
    params: Arc<RingParameters>,
    rng: DefaultSecureRng,
}

impl NtruKeyGenerator {
    pub fn new(params: Arc<RingParameters>, rng: DefaultSecureRng) -> Self {
        NtruKeyGenerator { params, rng }
    }

    /// Samples a ternary secret f from Xs and computes f^-1 via the
    /// almost-inverse algorithm, retrying on the (rare) non-invertible
    /// draws. Both halves are returned in NTT form.
    pub fn gen_secret_pair_new(&mut self) -> Result<NtruSecretPair> {
        let ring = self.params.ring();
        let n = ring.n();

        for _ in 0..64 {
            let f_signed = sample_distribution_i64(self.params.xs(), n, &mut self.rng);

            let mut stats = Stats::default();
            stats.add_more(&f_signed);
            tracing::debug!(std = stats.std_dev(), "sampled ntru secret");

            let f = ring.poly_from_signed(&f_signed);
            let inv_rows: Option<Vec<Vec<u64>>> = ring
                .subrings()
                .iter()
                .zip(f.coeffs.iter())
                .map(|(s, row)| almost_inverse(&s.modop, row))
                .collect();

            let Some(inv_rows) = inv_rows else {
                continue;
            };

            let mut f_ntt = f.clone();
            ring.ntt(&mut f_ntt);
            let mut f_inv = f.clone();
            f_inv
                .coeffs
                .iter_mut()
                .zip(inv_rows)
                .for_each(|(row, inv)| *row = inv);
            ring.ntt(&mut f_inv);

            // f * f^-1 = 1 exactly; anything else is a bug in the inversion.
            let mut check = f_ntt.clone();
            ring.mul_assign(&mut check, &f_inv);
            ring.intt(&mut check);
            let one = ring.new_monomial(0);
            assert!(check == one, "almost-inverse returned a non-inverse");

            return Ok(NtruSecretPair {
                f: NtruSecretKey { value: f_ntt },
                f_inv: NtruSecretKey { value: f_inv },
            });
        }

        Err(Error::InvalidParameter(
            "secret distribution keeps producing non-invertible polynomials".into(),
        ))
    }
}

fn degree(v: &[u64]) -> i64 {
    for i in (0..v.len()).rev() {
        if v[i] != 0 {
            return i as i64;
        }
    }
    -1
}

/// Negacyclic multiplication by X^k on a single residue row.
fn mul_by_monomial_row(op: &ModularOpsU64, v: &[u64], k: i64) -> Vec<u64> {
    let n = v.len();
    let two_n = 2 * n as i64;
    let k = k.rem_euclid(two_n) as usize;
    let mut out = vec![0u64; n];
    for (i, vi) in v.iter().enumerate() {
        let mut to = i + k;
        if to >= 2 * n {
            to -= 2 * n;
        }
        if to >= n {
            out[to - n] = op.neg(vi);
        } else {
            out[to] = *vi;
        }
    }
    out
}

/// Almost-inverse of a ternary polynomial in Z_q[X]/(X^N + 1).
///
/// Runs the classical extended-GCD against the cyclotomic modulus: divide
/// out common powers of X (tracked by k), eliminate the constant term of
/// the larger operand, and finish with b * (-f_0^-1) * X^{N-k} once f has
/// collapsed to a constant.
fn almost_inverse(op: &ModularOpsU64, f_in: &[u64]) -> Option<Vec<u64>> {
    let n = f_in.len();
    let q = op.q();

    let mut f = f_in.to_vec();
    let mut b = vec![0u64; n];
    b[0] = 1;
    let mut c = vec![0u64; n];
    let mut k: i64 = 0;

    while f[0] == 0 {
        f = mul_by_monomial_row(op, &f, -1);
        k += 1;
        if k > 2 * n as i64 {
            return None;
        }
    }

    // Fold the first reduction against X^N + 1 into the state: with
    // f_0 = +-1, (X^N + 1 -+ f) / X has the coefficients of -+(f - f_0)/X
    // plus X^{N-1}.
    let mut tmp = f.clone();
    tmp[0] = 0;
    tmp = mul_by_monomial_row(op, &tmp, -1);
    let mut g = vec![0u64; n];
    if f[0] == 1 {
        g.iter_mut().zip(tmp.iter()).for_each(|(gi, ti)| *gi = op.neg(ti));
        g[n - 1] = 1;
        std::mem::swap(&mut f, &mut g);
        std::mem::swap(&mut b, &mut c);
        op.elwise_sub_mut(&mut b, &c);
    } else if f[0] == q - 1 {
        g.copy_from_slice(&tmp);
        g[n - 1] = 1;
        std::mem::swap(&mut f, &mut g);
        std::mem::swap(&mut b, &mut c);
        op.elwise_add_mut(&mut b, &c);
    } else {
        // secrets are ternary; anything else cannot reach here
        return None;
    }
    c = mul_by_monomial_row(op, &c, 1);
    k += 1;

    let mut guard = 0usize;
    loop {
        while f[0] == 0 {
            f = mul_by_monomial_row(op, &f, -1);
            c = mul_by_monomial_row(op, &c, 1);
            k += 1;
            if k > 4 * n as i64 {
                return None;
            }
        }

        if degree(&f) == 0 {
            let f0_inv = mod_inverse_u64(f[0], q)?;
            let neg = op.neg(&f0_inv);
            op.elwise_scalar_mul_mut(&mut b, &neg);
            return Some(mul_by_monomial_row(op, &b, n as i64 - k));
        }

        if degree(&f) < degree(&g) {
            std::mem::swap(&mut f, &mut g);
            std::mem::swap(&mut b, &mut c);
        }

        let g0_inv = mod_inverse_u64(g[0], q)?;
        let u = op.mul(&f[0], &g0_inv);
        for i in 0..n {
            f[i] = op.sub(&f[i], &op.mul(&u, &g[i]));
            b[i] = op.sub(&b[i], &op.mul(&u, &c[i]));
        }

        guard += 1;
        if guard > 64 * n {
            return None;
        }
    }
}
