use crate::backend::{ModInit, ModularOpsU64, Modulus};
use crate::utils::bit_reverse;

pub trait NttInit {
    /// `q` must be prime with 2n | q - 1.
    fn new(q: u64, n: usize) -> Self;
}

/// Negacyclic number-theoretic transform over Z_q[X]/(X^n + 1).
///
/// Forward maps natural-order coefficients to the evaluation domain where
/// slot `i` holds the evaluation at `psi^{2*bitrev(i)+1}` for a fixed
/// primitive 2n-th root of unity `psi`. Backward inverts it exactly. Both
/// directions take and return fully reduced values in [0, q).
pub trait Ntt {
    type Element;
    fn forward(&self, v: &mut [Self::Element]);
    fn backward(&self, v: &mut [Self::Element]);
}

pub struct NttBackendU64 {
    q: u64,
    n: usize,
    psi_rev: Vec<u64>,
    psi_rev_shoup: Vec<u64>,
    ipsi_rev: Vec<u64>,
    ipsi_rev_shoup: Vec<u64>,
    n_inv: u64,
    n_inv_shoup: u64,
}

fn prime_factors(mut v: u64) -> Vec<u64> {
    let mut out = vec![];
    let mut d = 2u64;
    while d * d <= v {
        if v % d == 0 {
            out.push(d);
            while v % d == 0 {
                v /= d;
            }
        }
        d += 1;
    }
    if v > 1 {
        out.push(v);
    }
    out
}

/// Smallest generator of Z_q^* for prime q.
fn find_generator(op: &ModularOpsU64) -> u64 {
    let q = op.q();
    let factors = prime_factors(q - 1);
    'next: for g in 2..q {
        for f in factors.iter() {
            if op.pow_mod(g, (q - 1) / f) == 1 {
                continue 'next;
            }
        }
        return g;
    }
    unreachable!("no generator found; modulus is not prime");
}

impl NttInit for NttBackendU64 {
    fn new(q: u64, n: usize) -> Self {
        assert!(n.is_power_of_two());
        let two_n = 2 * n as u64;
        assert!(
            (q - 1) % two_n == 0,
            "ntt modulus {q} does not support degree {n}"
        );

        let op = ModularOpsU64::new(q);
        let g = find_generator(&op);
        let psi = op.pow_mod(g, (q - 1) / two_n);
        // primitive 2n-th root: psi^n = -1
        assert!(op.pow_mod(psi, n as u64) == q - 1);
        let ipsi = op.pow_mod(psi, two_n - 1);

        // psi_rev[bitrev(i)] = psi^i
        let log_n = n.trailing_zeros() as usize;
        let mut psi_rev = vec![0u64; n];
        let mut ipsi_rev = vec![0u64; n];
        let mut pow = 1u64;
        let mut ipow = 1u64;
        for i in 0..n {
            let r = bit_reverse(i, log_n);
            psi_rev[r] = pow;
            ipsi_rev[r] = ipow;
            pow = ((pow as u128 * psi as u128) % q as u128) as u64;
            ipow = ((ipow as u128 * ipsi as u128) % q as u128) as u64;
        }

        let psi_rev_shoup = psi_rev.iter().map(|w| op.shoup_precompute(*w)).collect();
        let ipsi_rev_shoup = ipsi_rev.iter().map(|w| op.shoup_precompute(*w)).collect();

        let n_inv = op.pow_mod(n as u64, q - 2);
        let n_inv_shoup = op.shoup_precompute(n_inv);

        NttBackendU64 {
            q,
            n,
            psi_rev,
            psi_rev_shoup,
            ipsi_rev,
            ipsi_rev_shoup,
            n_inv,
            n_inv_shoup,
        }
    }
}

impl NttBackendU64 {
    #[inline]
    fn add_mod(&self, a: u64, b: u64) -> u64 {
        let c = a + b;
        if c >= self.q {
            c - self.q
        } else {
            c
        }
    }

    #[inline]
    fn sub_mod(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            a + self.q - b
        }
    }

    #[inline]
    fn shoup_mul(&self, w: u64, w_shoup: u64, x: u64) -> u64 {
        let hi = ((w_shoup as u128 * x as u128) >> 64) as u64;
        let r = w.wrapping_mul(x).wrapping_sub(hi.wrapping_mul(self.q));
        if r >= self.q {
            r - self.q
        } else {
            r
        }
    }
}

impl Ntt for NttBackendU64 {
    type Element = u64;

    fn forward(&self, a: &mut [u64]) {
        debug_assert!(a.len() == self.n);
        let n = self.n;
        let mut t = n;
        let mut m = 1;
        while m < n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let s = self.psi_rev[m + i];
                let s_shoup = self.psi_rev_shoup[m + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = self.shoup_mul(s, s_shoup, a[j + t]);
                    a[j] = self.add_mod(u, v);
                    a[j + t] = self.sub_mod(u, v);
                }
            }
            m <<= 1;
        }
    }

    fn backward(&self, a: &mut [u64]) {
        debug_assert!(a.len() == self.n);
        let n = self.n;
        let mut t = 1;
        let mut m = n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let s = self.ipsi_rev[h + i];
                let s_shoup = self.ipsi_rev_shoup[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = self.add_mod(u, v);
                    a[j + t] = self.shoup_mul(s, s_shoup, self.sub_mod(u, v));
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }
        for x in a.iter_mut() {
            *x = self.shoup_mul(self.n_inv, self.n_inv_shoup, *x);
        }
    }
}
