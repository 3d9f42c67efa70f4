use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ntru::{NtruCiphertext, NtruSecretKey};
use crate::parameters::RingParameters;
use crate::ring::Poly;

/// Decrypts by pairing the value vector against powers of f:
/// sum_i value[i] * f^{deg - i}. For standard ciphertexts this is
/// value[1] * f = m + g.
pub struct NtruDecryptor {
    params: Arc<RingParameters>,
    sk: Arc<NtruSecretKey>,
}

impl NtruDecryptor {
    pub fn new(params: Arc<RingParameters>, sk: Arc<NtruSecretKey>) -> Result<Self> {
        if sk.value.n() != params.n() || sk.value.chain_len() != params.ring().chain_len() {
            return Err(Error::InvalidParameter(
                "decryption key ring degree does not match parameters".into(),
            ));
        }
        Ok(NtruDecryptor { params, sk })
    }

    /// Returns the noisy plaintext in coefficient form.
    pub fn decrypt_new(&self, ct: &NtruCiphertext) -> Poly {
        let ring = self.params.ring();
        let deg = ct.degree();

        // Horner over f in the evaluation domain.
        let mut pt = ct.value[deg].clone();
        if !ct.is_ntt {
            ring.ntt(&mut pt);
        }
        for i in (0..deg).rev() {
            ring.mul_assign(&mut pt, &self.sk.value);
            if ct.is_ntt {
                ring.add_assign(&mut pt, &ct.value[i]);
            } else {
                let mut low = ct.value[i].clone();
                ring.ntt(&mut low);
                ring.add_assign(&mut pt, &low);
            }
        }
        ring.intt(&mut pt);
        pt
    }

    /// Centered constant coefficient of the decryption; the quantity the
    /// blind-rotation pipeline reads out.
    pub fn decrypt_constant_new(&self, ct: &NtruCiphertext) -> i64 {
        let pt = self.decrypt_new(ct);
        self.params.ring().to_centered_i64(&pt)[0]
    }

    pub fn shallow_copy(&self) -> Self {
        NtruDecryptor {
            params: self.params.clone(),
            sk: self.sk.clone(),
        }
    }

    pub fn with_key(&self, sk: Arc<NtruSecretKey>) -> Self {
        NtruDecryptor {
            params: self.params.clone(),
            sk,
        }
    }
}
