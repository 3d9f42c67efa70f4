/// Errors surfaced by parameter construction and homomorphic operations.
///
/// Cross-component invariants (e.g. gadget shapes agreeing between an NGSW
/// ciphertext and the evaluator that consumes it) are asserted instead:
/// violating them is a bug in this crate, not a caller mistake.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no galois key installed for element {galois_element}")]
    NoGaloisKey { galois_element: u64 },

    #[error("blind rotation key index {index} out of range (key set holds {len})")]
    BlindRotationKeyMissing { index: usize, len: usize },

    #[error("{op} requires {expected} form input")]
    FormatMismatch {
        op: &'static str,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
