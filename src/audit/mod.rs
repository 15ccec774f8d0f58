//! Scrutineering audit trail: immutable vote marks and the turnout counters
//! derived from them

pub mod marks;
pub mod verification;

pub use marks::{AuditLog, PollTurnoutDetails, TurnoutSummary, TurnoutTotals};
pub use verification::{format_verification_code, generate_verification_code, normalize_verification_code};
