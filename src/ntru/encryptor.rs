use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ntru::{NtruCiphertext, NtruSecretKey};
use crate::parameters::RingParameters;
use crate::random::{sample_distribution_i64, DefaultSecureRng};
use crate::ring::Poly;
use crate::utils::Stats;

/// Encrypts under f^-1: a fresh ciphertext is c1 = (g + m) * f^-1 with g
/// drawn from Xe. The encryptor only ever holds the inverse key.
pub struct NtruEncryptor {
    params: Arc<RingParameters>,
    key: Arc<NtruSecretKey>,
    rng: DefaultSecureRng,
    buff: Poly,
}

impl NtruEncryptor {
    pub fn new(
        params: Arc<RingParameters>,
        key: Arc<NtruSecretKey>,
        rng: DefaultSecureRng,
    ) -> Result<Self> {
        if key.value.n() != params.n() || key.value.chain_len() != params.ring().chain_len() {
            return Err(Error::InvalidParameter(
                "encryption key ring degree does not match parameters".into(),
            ));
        }
        let buff = params.ring().new_poly();
        Ok(NtruEncryptor { params, key, rng, buff })
    }

    pub fn params(&self) -> &Arc<RingParameters> {
        &self.params
    }

    /// c1 <- g * f^-1 in NTT form.
    pub(crate) fn encrypt_zero_into(&mut self, c1: &mut Poly) {
        let ring = self.params.ring();
        let g = sample_distribution_i64(self.params.xe(), ring.n(), &mut self.rng);

        let mut stats = Stats::default();
        stats.add_more(&g);
        tracing::debug!(std = stats.std_dev(), "ntru encryption noise");

        self.buff = ring.poly_from_signed(&g);
        ring.ntt(&mut self.buff);
        ring.mul_into(&self.buff, &self.key.value, c1);
    }

    pub fn encrypt_zero_new(&mut self) -> NtruCiphertext {
        let mut ct = NtruCiphertext::new(&self.params, 1);
        let mut c1 = self.params.ring().new_poly();
        self.encrypt_zero_into(&mut c1);
        ct.value[1] = c1;
        ct
    }

    /// Encrypts `pt` (NTT form): c1 = (g + pt) * f^-1, so decryption
    /// recovers pt + g.
    pub fn encrypt_new(&mut self, pt: &Poly) -> NtruCiphertext {
        let ring = self.params.ring();
        let mut ct = NtruCiphertext::new(&self.params, 1);

        let g = sample_distribution_i64(self.params.xe(), ring.n(), &mut self.rng);
        self.buff = ring.poly_from_signed(&g);
        ring.ntt(&mut self.buff);
        ring.add_assign(&mut self.buff, pt);
        ring.mul_into(&self.buff, &self.key.value, &mut ct.value[1]);
        ct
    }

    /// Packages `pt` (NTT form) as a ciphertext without touching it:
    /// c1 = pt, which decrypts to pt * f.
    pub fn encrypt_poly_new(&mut self, pt: &Poly) -> NtruCiphertext {
        let mut ct = NtruCiphertext::new(&self.params, 1);
        ct.value[1].copy_from(pt);
        ct
    }

    /// Shares the key, owns fresh buffers and randomness.
    pub fn shallow_copy(&self) -> Self {
        NtruEncryptor {
            params: self.params.clone(),
            key: self.key.clone(),
            rng: DefaultSecureRng::new(),
            buff: self.params.ring().new_poly(),
        }
    }

    /// Same buffers-and-parameters shape under a different key.
    pub fn with_key(&self, key: Arc<NtruSecretKey>) -> Result<Self> {
        NtruEncryptor::new(self.params.clone(), key, DefaultSecureRng::new())
    }
}
