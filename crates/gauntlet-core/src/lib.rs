//! Vote tallying, outcome resolution and scoreboard accounting for
//! challenge debates.
//!
//! The synchronous modules (`ledger`, `outcome`, `scoreboard`) each own one
//! kind of mutation and talk to the store directly. [`Arbiter`] is the async
//! entry point: it serializes work per challenge, bounds every store round
//! trip with a timeout and fires the close transition exactly once.

pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod outcome;
pub mod scoreboard;

pub use error::{ChallengeError, Result};
pub use ledger::{LedgerOutcome, Rejection};
pub use lifecycle::{Arbiter, BallotAction, ChallengeState, NewChallenge, STOP_QUORUM, Settlement};
