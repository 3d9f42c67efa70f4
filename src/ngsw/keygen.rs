use std::sync::Arc;

use crate::error::Result;
use crate::ngsw::{GaloisKey, GaloisKeySet, NgswEncryptor};
use crate::ntru::{NtruSecretKey, NtruSecretPair};
use crate::parameters::RingParameters;
use crate::random::DefaultSecureRng;

/// Generates automorphism (galois) keys: NGSW encryptions of
/// f(X^k) * f^-1(X) under f^-1.
pub struct NgswKeyGenerator {
    params: Arc<RingParameters>,
    enc: NgswEncryptor,
}

impl NgswKeyGenerator {
    pub fn new(
        params: Arc<RingParameters>,
        f_inv: Arc<NtruSecretKey>,
        rng: DefaultSecureRng,
    ) -> Result<Self> {
        let enc = NgswEncryptor::new(params.clone(), f_inv, rng)?;
        Ok(NgswKeyGenerator { params, enc })
    }

    pub fn gen_galois_key(&mut self, k: u64, pair: &NtruSecretPair) -> GaloisKey {
        let ring = self.params.ring();
        // f(X^k) / f(X), all in the evaluation domain
        let mut fk = ring.new_poly();
        ring.automorphism_ntt(&pair.f.value, k, &mut fk);
        ring.mul_assign(&mut fk, &pair.f_inv.value);

        GaloisKey {
            galois_element: k,
            ct: self.enc.encrypt_new(Some(&fk)),
        }
    }

    pub fn gen_galois_keys_new(&mut self, ks: &[u64], pair: &NtruSecretPair) -> GaloisKeySet {
        GaloisKeySet::new(ks.iter().map(|k| self.gen_galois_key(*k, pair)).collect())
    }
}
