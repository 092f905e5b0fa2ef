//! Pure registration rules. Callers load a consistent snapshot inside a
//! transaction, ask these types for a decision and persist the outcome.

pub mod conventions;
pub mod dates;
pub mod runs;
