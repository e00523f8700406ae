use thiserror::Error;

/// Error taxonomy of the chemistry engine. Every fallible operation in the
/// crate returns this; nothing is reported through ambient state.
#[derive(Debug, Error)]
pub enum ChemEngineError {
    /// Operation requested before the phase (or engine) is initialized.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Reaction tag does not match the kinetic data carried by the record.
    #[error("invalid reaction kind for '{equation}': {details}")]
    InvalidKind { equation: String, details: String },

    /// A reaction or third-body efficiency references a species the phase
    /// does not declare.
    #[error("undeclared species '{species}' in reaction '{equation}'")]
    UndeclaredSpecies { species: String, equation: String },

    /// A computed rate or property came out NaN/Inf.
    #[error("non-finite value: {what}[{index}] in {context}")]
    NonFinite {
        context: &'static str,
        what: &'static str,
        index: usize,
    },

    /// The cubic EOS solve hit the |discriminant| <= eps double-root branch.
    /// Informational: the solve still returns a valid root.
    #[error("cubic EOS solve hit a degenerate double root")]
    CubicSolveDegenerate,

    /// A QSS structural assumption does not hold (warned, not fatal).
    #[error("QSS assumption violated: {0}")]
    AssumptionViolated(String),

    /// Query only defined for a parameterization this phase does not carry.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Non-physical state input (T <= 0, rho <= 0, negative mass fraction).
    #[error("invalid state: {0}")]
    InvalidState(String),
}
