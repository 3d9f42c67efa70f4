use std::sync::Arc;

use crate::backend::{ShoupOps, VectorOps};
use crate::error::Result;
use crate::ngsw::NgswCiphertext;
use crate::ntru::{NtruEncryptor, NtruSecretKey};
use crate::parameters::RingParameters;
use crate::random::DefaultSecureRng;
use crate::ring::Poly;

/// Builds NGSW ciphertexts: a matrix of NTRU zero-encryptions with the
/// plaintext inserted along the gadget.
pub struct NgswEncryptor {
    inner: NtruEncryptor,
    buff: Poly,
}

impl NgswEncryptor {
    pub fn new(
        params: Arc<RingParameters>,
        key: Arc<NtruSecretKey>,
        rng: DefaultSecureRng,
    ) -> Result<Self> {
        let buff = params.ring().new_poly();
        Ok(NgswEncryptor {
            inner: NtruEncryptor::new(params, key, rng)?,
            buff,
        })
    }

    pub fn params(&self) -> &Arc<RingParameters> {
        self.inner.params()
    }

    /// Encrypts `pt` (NTT form) as an NGSW ciphertext; `None` encrypts zero.
    pub fn encrypt_new(&mut self, pt: Option<&Poly>) -> NgswCiphertext {
        let params = self.inner.params().clone();
        let ring = params.ring();
        let counts = params.gadget_counts();

        let mut value: Vec<Vec<Poly>> = counts
            .iter()
            .map(|d| {
                (0..*d)
                    .map(|_| {
                        let mut c1 = ring.new_poly();
                        self.inner.encrypt_zero_into(&mut c1);
                        c1
                    })
                    .collect()
            })
            .collect();

        if let Some(pt) = pt {
            add_poly_times_gadget(&params, pt, &mut value, &mut self.buff);
        }

        let value_shoup = value
            .iter()
            .map(|row| {
                row.iter()
                    .map(|p| {
                        let mut s = ring.new_poly();
                        for (u, sub) in ring.subrings().iter().enumerate() {
                            let repr = sub.modop.shoup_repr(p.row(u));
                            s.row_mut(u).copy_from_slice(&repr);
                        }
                        s
                    })
                    .collect()
            })
            .collect();

        NgswCiphertext {
            value,
            value_shoup,
            base2_log: params.base2_log(),
        }
    }

    pub fn shallow_copy(&self) -> Self {
        NgswEncryptor {
            inner: self.inner.shallow_copy(),
            buff: self.inner.params().ring().new_poly(),
        }
    }
}

/// Adds pt * B^{jB} into entry (i, j) at chain position i only: the
/// standard gadget-insertion pattern that makes the matrix decrypt to pt
/// when contracted against a gadget decomposition.
fn add_poly_times_gadget(
    params: &RingParameters,
    pt: &Poly,
    value: &mut [Vec<Poly>],
    buff: &mut Poly,
) {
    let ring = params.ring();
    let counts = params.gadget_counts();
    let max_count = *counts.iter().max().unwrap();
    let base = 1u64 << params.base2_log();

    buff.copy_from(pt);
    for j in 0..max_count {
        for (i, sub) in ring.subrings().iter().enumerate() {
            if j < counts[i] {
                sub.modop.elwise_add_mut(value[i][j].row_mut(i), buff.row(i));
            }
        }
        ring.scalar_mul_assign(buff, base);
    }
}
