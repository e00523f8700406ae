/// blended ideal-gas / Peng-Robinson phase: state, two-level cache, cubic
/// EOS solve, departure functions and all composition/temperature partials
pub mod blend_phase;
/// tests
pub mod blend_phase_tests;
/// critical-point data, binary interaction table and PR mixing rules
pub mod critical_props;
/// NASA-7 reference thermodynamics evaluators
pub mod nasa_poly;
