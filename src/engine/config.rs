//! Engine-wide constants (spec §5, §6, §9). These are not runtime-tunable:
//! `B_BAR` is baked into the communication-cost table's ABI and `EPSILON`
//! is the one comparison tolerance used throughout the engine.

/// Canonical average bandwidth at which the input communication-cost table
/// is normalized. Changing this is a format-breaking change to that table
/// (spec §6).
pub const B_BAR: f64 = 25.0;

/// Absolute tolerance used for every floating-point overlap and precedence
/// comparison (spec §5, §9). Never compare timing values with `==`.
pub const EPSILON: f64 = 1e-9;
