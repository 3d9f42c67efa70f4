mod encryptor;
mod evaluator;
mod keygen;

pub use encryptor::NgswEncryptor;
pub use evaluator::NgswEvaluator;
pub use keygen::NgswKeyGenerator;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::parameters::RingParameters;
use crate::ring::Poly;

/// Gadget-decomposed NTRU ciphertext.
///
/// `value[i][j]` is the used polynomial of an NTRU zero-encryption to which
/// the gadget term m * B^{jB} has been added at the chain position
/// selecting prime i (the no-P gadget form). Entries are kept in NTT form
/// together with their Shoup companions for the external-product FMA.
#[derive(Clone, Debug)]
pub struct NgswCiphertext {
    pub(crate) value: Vec<Vec<Poly>>,
    pub(crate) value_shoup: Vec<Vec<Poly>>,
    pub(crate) base2_log: usize,
}

impl NgswCiphertext {
    pub fn base2_log(&self) -> usize {
        self.base2_log
    }

    pub(crate) fn assert_shape(&self, params: &RingParameters) {
        let counts = params.gadget_counts();
        assert!(
            self.base2_log == params.base2_log()
                && self.value.len() == params.ring().chain_len()
                && self
                    .value
                    .iter()
                    .zip(counts.iter())
                    .all(|(row, c)| row.len() == *c),
            "gadget shape disagrees with ring parameters"
        );
    }
}

/// NGSW encryption of f(X^k) * f^-1(X) enabling the homomorphic
/// automorphism X -> X^k.
pub struct GaloisKey {
    pub galois_element: u64,
    pub(crate) ct: NgswCiphertext,
}

/// Installed automorphism keys, looked up by galois element.
pub struct GaloisKeySet {
    keys: HashMap<u64, GaloisKey>,
}

impl GaloisKeySet {
    pub fn new(keys: Vec<GaloisKey>) -> Self {
        GaloisKeySet {
            keys: keys.into_iter().map(|k| (k.galois_element, k)).collect(),
        }
    }

    pub fn get(&self, galois_element: u64) -> Result<&GaloisKey> {
        self.keys
            .get(&galois_element)
            .ok_or(Error::NoGaloisKey { galois_element })
    }

    pub fn elements(&self) -> impl Iterator<Item = u64> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// All odd galois elements {3, 5, ..., 2N-1}; the rotation schedule, the
/// test-polynomial combiner and the trace draw from this set.
pub fn all_galois_elements(n: usize) -> Vec<u64> {
    (1..n as u64).map(|i| 2 * i + 1).collect()
}
