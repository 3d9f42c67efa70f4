//! High-precision bootstrapping for TFHE-style LWE ciphertexts via an
//! NTRU-based blind-rotation engine.
//!
//! A bootstrap takes a noisy LWE encryption of a small integer through a
//! blind rotation on an NTRU accumulator (NGSW external products plus ring
//! automorphisms), then key-switches and modulus-switches back to the
//! starting LWE parameters, optionally applying a univariate function on
//! the way. Higher precision is reached by a tree of base-p digits: one
//! multi-value rotation on the high digit yields both its refreshed output
//! and an encrypted test polynomial that the low digits are rotated
//! against.

mod backend;
mod bootstrap;
mod decomposer;
mod error;
mod lwe;
mod ngsw;
mod ntru;
mod ntt;
mod parameters;
mod pbs;
mod random;
mod ring;
mod utils;

pub use backend::{ArithmeticOps, ModInit, ModularOpsU64, Modulus, ShoupOps, VectorOps};
pub use bootstrap::{decompose_digits, recompose_digits, Bootstrapper};
pub use decomposer::{Decomposer, SignedDecomposer};
pub use error::{Error, Result};
pub use lwe::{
    decode, encode, lwe_key_switch, lwe_ksk_keygen, lwe_modulus_switch, LweCiphertext,
    LweDecryptor, LweEncryptor, LweKeySwitchKey, LweSecret,
};
pub use ngsw::{
    all_galois_elements, GaloisKey, GaloisKeySet, NgswCiphertext, NgswEncryptor, NgswEvaluator,
    NgswKeyGenerator,
};
pub use ntru::{
    NtruCiphertext, NtruDecryptor, NtruEncryptor, NtruKeyGenerator, NtruSecretKey, NtruSecretPair,
};
pub use ntt::{Ntt, NttBackendU64, NttInit};
pub use parameters::{
    br_params_n1024, br_params_n2048, mv_params_n2048, LweParameters, RingParameters,
    RingParametersLiteral,
};
pub use pbs::{
    convert_test_poly, gen_blind_rotation_key, init_identity_test_poly,
    init_multi_value_base_poly, init_relu_test_polys, BlindRotationEvaluator,
    BlindRotationKeySet, MemBlindRotationKeySet,
};
pub use random::{DefaultSecureRng, Distribution, GaussianErrorSampler};
pub use ring::{Poly, RingQ};
pub use utils::Stats;

/// Anything that can encrypt a message of type `M` into ciphertext `C`.
pub trait Encryptor<M: ?Sized, C> {
    fn encrypt(&mut self, m: &M) -> C;
}

/// Anything that can decrypt ciphertext `C` back to `M`.
pub trait Decryptor<M, C> {
    fn decrypt(&self, c: &C) -> M;
}

impl Encryptor<u64, LweCiphertext> for LweEncryptor {
    fn encrypt(&mut self, m: &u64) -> LweCiphertext {
        self.encrypt_new(*m)
    }
}

impl Decryptor<u64, LweCiphertext> for LweDecryptor {
    fn decrypt(&self, c: &LweCiphertext) -> u64 {
        self.decrypt_new(c)
    }
}

impl Encryptor<Poly, NtruCiphertext> for NtruEncryptor {
    fn encrypt(&mut self, m: &Poly) -> NtruCiphertext {
        self.encrypt_new(m)
    }
}

impl Decryptor<Poly, NtruCiphertext> for NtruDecryptor {
    fn decrypt(&self, c: &NtruCiphertext) -> Poly {
        self.decrypt_new(c)
    }
}
