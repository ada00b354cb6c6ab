//! External signal review port trait.

use crate::domain::advisory::{AdvisoryVerdict, TechnicalContext};
use crate::domain::error::UnumError;

/// A reviewer that returns a verdict on the latest signal.
///
/// Callers go through [`crate::domain::advisory::consult`], which turns any
/// error into an `ERROR` verdict.
pub trait AdvisoryPort {
    fn analyze(&self, context: &TechnicalContext) -> Result<AdvisoryVerdict, UnumError>;
}
