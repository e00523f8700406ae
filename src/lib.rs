#[allow(non_snake_case)]
pub mod Kinetics;
#[allow(non_snake_case)]
pub mod Thermodynamics;
pub mod error;

/// Universal gas constant, J/(kmol*K).
pub const GAS_CONSTANT: f64 = 8314.462618;

/// Floor used when dividing by quantities that may be zero.
pub const SMALL_NUMBER: f64 = 1.0e-300;

/// Clamp for reciprocal equilibrium constants and similar blow-ups.
pub const BIG_NUMBER: f64 = 1.0e300;
