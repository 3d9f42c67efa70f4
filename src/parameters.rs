use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decomposer::SignedDecomposer;
use crate::error::{Error, Result};
use crate::random::Distribution;
use crate::ring::RingQ;

/// Literal description of the blind-rotation ring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RingParametersLiteral {
    pub log_n: usize,
    /// NTT-friendly prime chain Q.
    pub q: Vec<u64>,
    /// log2 of the NGSW gadget base.
    pub base2_log: usize,
    /// Error distribution Xe for NTRU encryptions.
    pub xe: Distribution,
    /// Secret distribution Xs for the NTRU key f.
    pub xs: Distribution,
}

/// Validated ring parameters plus the gadget decomposers derived from them.
/// The NGSW encryptor and evaluator both read their gadget shape from here,
/// which is what keeps the two sides structurally consistent.
pub struct RingParameters {
    literal: RingParametersLiteral,
    ring: Arc<RingQ>,
    gadget: Vec<SignedDecomposer>,
}

impl RingParameters {
    pub fn new(literal: RingParametersLiteral) -> Result<Self> {
        if literal.log_n < 3 || literal.log_n > 16 {
            return Err(Error::InvalidParameter(format!(
                "log_n {} out of range",
                literal.log_n
            )));
        }
        let ring = RingQ::new(1 << literal.log_n, &literal.q)?;
        if literal.base2_log < 2 || literal.base2_log > 30 {
            return Err(Error::InvalidParameter(format!(
                "base2_log {} out of range",
                literal.base2_log
            )));
        }
        let gadget = literal
            .q
            .iter()
            .map(|qi| SignedDecomposer::new(*qi, literal.base2_log))
            .collect();
        Ok(RingParameters {
            literal,
            ring: Arc::new(ring),
            gadget,
        })
    }

    pub fn n(&self) -> usize {
        1 << self.literal.log_n
    }

    pub fn log_n(&self) -> usize {
        self.literal.log_n
    }

    pub fn ring(&self) -> &RingQ {
        &self.ring
    }

    pub fn ring_arc(&self) -> Arc<RingQ> {
        self.ring.clone()
    }

    pub fn base2_log(&self) -> usize {
        self.literal.base2_log
    }

    pub fn xe(&self) -> &Distribution {
        &self.literal.xe
    }

    pub fn xs(&self) -> &Distribution {
        &self.literal.xs
    }

    /// Per-prime gadget decomposers (rns axis of the NGSW matrix).
    pub fn gadget(&self) -> &[SignedDecomposer] {
        &self.gadget
    }

    /// Pow2-axis lengths of the NGSW gadget, per chain prime.
    pub fn gadget_counts(&self) -> Vec<usize> {
        use crate::decomposer::Decomposer;
        self.gadget.iter().map(|d| d.decomposition_count()).collect()
    }
}

/// LWE parameter triple (n, q, p); q and p are powers of two.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LweParameters {
    n: usize,
    q: u64,
    p: u64,
}

impl LweParameters {
    pub fn new(n: usize, q: u64, p: u64) -> Result<Self> {
        if !q.is_power_of_two() || !p.is_power_of_two() {
            return Err(Error::InvalidParameter(format!(
                "lwe moduli must be powers of two, got q={q} p={p}"
            )));
        }
        if 4 * p > q {
            return Err(Error::InvalidParameter(format!(
                "plaintext modulus {p} too large for ciphertext modulus {q}"
            )));
        }
        if n == 0 {
            return Err(Error::InvalidParameter("lwe dimension must be nonzero".into()));
        }
        Ok(LweParameters { n, q, p })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn q(&self) -> u64 {
        self.q
    }

    pub fn p(&self) -> u64 {
        self.p
    }

    /// Plaintext scale q / 2p.
    pub fn delta(&self) -> u64 {
        self.q / (2 * self.p)
    }

    /// Decoding window offset q / 4p; also the error margin.
    pub fn window(&self) -> u64 {
        self.q / (4 * self.p)
    }

    pub fn with_modulus(&self, q: u64) -> Result<Self> {
        Self::new(self.n, q, self.p)
    }
}

/// Blind-rotation ring preset: N = 1024, Q ~ 2^19.9, sparse ternary errors.
pub fn br_params_n1024() -> RingParametersLiteral {
    RingParametersLiteral {
        log_n: 10,
        q: vec![995329],
        base2_log: 3,
        xe: Distribution::Ternary { hamming_weight: 50 },
        xs: Distribution::Ternary {
            hamming_weight: 512,
        },
    }
}

/// Blind-rotation ring preset: N = 2048, Q ~ 2^25.4.
pub fn br_params_n2048() -> RingParametersLiteral {
    RingParametersLiteral {
        log_n: 11,
        q: vec![44421121],
        base2_log: 4,
        xe: Distribution::TernaryDensity { zero_prob: 0.5 },
        xs: Distribution::Ternary {
            hamming_weight: 1024,
        },
    }
}

/// Multi-value / tree variant of the N = 2048 preset with sparser errors to
/// absorb the convert-polynomial noise amplification.
pub fn mv_params_n2048() -> RingParametersLiteral {
    RingParametersLiteral {
        log_n: 11,
        q: vec![44421121],
        base2_log: 2,
        xe: Distribution::Ternary { hamming_weight: 32 },
        xs: Distribution::Ternary {
            hamming_weight: 1024,
        },
    }
}
