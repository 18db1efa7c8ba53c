//! [`Submission`] / [`Op`]: requests a caller sends into a thread.

use serde::Deserialize;
use serde::Serialize;

use crate::permission::UserChoice;

/// An operation submitted against a thread. `Interrupt` here means
/// "out-of-band abort" (§9: `USER_CANCEL`), distinct from the in-band
/// [`crate::event::Interrupt`] suspension record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    UserInput { text: String },
    /// Deliver the user's choice for a previously raised permission
    /// interrupt.
    Resume { interrupt_id: String, choice: UserChoice },
    Interrupt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub thread_id: String,
    pub op: Op,
}
