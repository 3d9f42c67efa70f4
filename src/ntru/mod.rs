mod decryptor;
mod encryptor;
mod keygen;

pub use decryptor::NtruDecryptor;
pub use encryptor::NtruEncryptor;
pub use keygen::NtruKeyGenerator;

use crate::parameters::RingParameters;
use crate::ring::Poly;

/// NTRU ciphertext over the blind-rotation ring.
///
/// Reuses the degree-d two-polynomial container shape: standard ciphertexts
/// have degree 1 with `value[0]` identically zero and
/// `value[1] = (g + m) * f^-1`. Decryption pairs the values against powers
/// of f, so higher-degree containers decrypt too.
#[derive(Clone, Debug)]
pub struct NtruCiphertext {
    pub value: Vec<Poly>,
    pub is_ntt: bool,
}

impl NtruCiphertext {
    /// Fresh zero ciphertext of the given degree in NTT form.
    pub fn new(params: &RingParameters, degree: usize) -> Self {
        NtruCiphertext {
            value: (0..=degree).map(|_| params.ring().new_poly()).collect(),
            is_ntt: true,
        }
    }

    pub fn degree(&self) -> usize {
        self.value.len() - 1
    }

    pub fn copy_from(&mut self, other: &NtruCiphertext) {
        debug_assert!(self.value.len() == other.value.len());
        self.value
            .iter_mut()
            .zip(other.value.iter())
            .for_each(|(a, b)| a.copy_from(b));
        self.is_ntt = other.is_ntt;
    }
}

/// One half of the NTRU secret pair, stored in NTT form.
#[derive(Clone, Debug)]
pub struct NtruSecretKey {
    pub value: Poly,
}

/// (f, f^-1) with f * f^-1 = 1 in R_Q; generation asserts the identity.
pub struct NtruSecretPair {
    pub f: NtruSecretKey,
    pub f_inv: NtruSecretKey,
}
