//! One ballot per voter per challenge.
//!
//! Every operation re-reads the challenge and the voter's row right before
//! deciding, and the store applies each change with a conditional statement,
//! so a stale decision is refused rather than double-applied.

use tracing::{debug, error};

use gauntlet_db::Database;
use gauntlet_types::models::{Ballot, Challenge, VoteCategory};

use crate::error::{ChallengeError, Result};

/// Why a ledger request was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Voting on the challenge has been closed.
    ChallengeClosed,
    /// The voter already holds a vote category.
    AlreadyVoted,
    /// The voter does not hold the ballot being retracted.
    NothingToRetract,
    /// The stop flag is already in the requested state.
    AlreadyInState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Applied,
    Rejected(Rejection),
}

impl LedgerOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

pub fn current_vote_category(
    db: &Database,
    voter_id: &str,
    challenge_id: &str,
) -> Result<Option<VoteCategory>> {
    Ok(db
        .get_vote_record(voter_id, challenge_id)?
        .and_then(|record| record.category))
}

pub fn has_stopped(db: &Database, voter_id: &str, challenge_id: &str) -> Result<bool> {
    Ok(db
        .get_vote_record(voter_id, challenge_id)?
        .is_some_and(|record| record.stopped))
}

pub fn cast_vote(
    db: &Database,
    voter_id: &str,
    challenge_id: &str,
    category: VoteCategory,
) -> Result<LedgerOutcome> {
    if let Some(rejection) = closed_check(db, challenge_id)? {
        return Ok(reject(voter_id, challenge_id, rejection));
    }

    if let Some(held) = current_vote_category(db, voter_id, challenge_id)? {
        debug!("{} already voted {} on {}", voter_id, held, challenge_id);
        return Ok(LedgerOutcome::Rejected(Rejection::AlreadyVoted));
    }

    if !db.set_vote_category(voter_id, challenge_id, category)? {
        // Lost a race with another cast from the same voter.
        return Ok(reject(voter_id, challenge_id, Rejection::AlreadyVoted));
    }

    if !db.adjust_tally(challenge_id, Ballot::Vote(category), 1)? {
        // Challenge closed between the check and the increment; undo the row.
        db.clear_vote_category(voter_id, challenge_id, category)?;
        return Ok(reject(voter_id, challenge_id, Rejection::ChallengeClosed));
    }

    debug!("{} voted {} on {}", voter_id, category, challenge_id);
    Ok(LedgerOutcome::Applied)
}

pub fn retract_vote(
    db: &Database,
    voter_id: &str,
    challenge_id: &str,
    category: VoteCategory,
) -> Result<LedgerOutcome> {
    if let Some(rejection) = closed_check(db, challenge_id)? {
        return Ok(reject(voter_id, challenge_id, rejection));
    }

    if !db.clear_vote_category(voter_id, challenge_id, category)? {
        return Ok(reject(voter_id, challenge_id, Rejection::NothingToRetract));
    }

    if !db.adjust_tally(challenge_id, Ballot::Vote(category), -1)? {
        error!(
            "{} tally on {} refused decrement after {} retracted",
            category, challenge_id, voter_id
        );
        return Err(ChallengeError::InvariantViolation(format!(
            "{} tally of {} out of step with ledger",
            category, challenge_id
        )));
    }

    debug!("{} retracted {} on {}", voter_id, category, challenge_id);
    Ok(LedgerOutcome::Applied)
}

pub fn cast_stop(db: &Database, voter_id: &str, challenge_id: &str) -> Result<LedgerOutcome> {
    if let Some(rejection) = closed_check(db, challenge_id)? {
        return Ok(reject(voter_id, challenge_id, rejection));
    }

    if !db.set_stop_flag(voter_id, challenge_id, true)? {
        return Ok(reject(voter_id, challenge_id, Rejection::AlreadyInState));
    }

    if !db.adjust_tally(challenge_id, Ballot::Stop, 1)? {
        db.set_stop_flag(voter_id, challenge_id, false)?;
        return Ok(reject(voter_id, challenge_id, Rejection::ChallengeClosed));
    }

    debug!("{} asked to stop {}", voter_id, challenge_id);
    Ok(LedgerOutcome::Applied)
}

pub fn retract_stop(db: &Database, voter_id: &str, challenge_id: &str) -> Result<LedgerOutcome> {
    if let Some(rejection) = closed_check(db, challenge_id)? {
        return Ok(reject(voter_id, challenge_id, rejection));
    }

    if !db.set_stop_flag(voter_id, challenge_id, false)? {
        return Ok(reject(voter_id, challenge_id, Rejection::AlreadyInState));
    }

    if !db.adjust_tally(challenge_id, Ballot::Stop, -1)? {
        error!("stop tally on {} refused decrement after {} retracted", challenge_id, voter_id);
        return Err(ChallengeError::InvariantViolation(format!(
            "stop tally of {} out of step with ledger",
            challenge_id
        )));
    }

    debug!("{} withdrew stop on {}", voter_id, challenge_id);
    Ok(LedgerOutcome::Applied)
}

/// Dispatch a cast or retraction of any ballot kind.
pub fn apply(
    db: &Database,
    voter_id: &str,
    challenge_id: &str,
    ballot: Ballot,
    cast: bool,
) -> Result<LedgerOutcome> {
    match (ballot, cast) {
        (Ballot::Vote(category), true) => cast_vote(db, voter_id, challenge_id, category),
        (Ballot::Vote(category), false) => retract_vote(db, voter_id, challenge_id, category),
        (Ballot::Stop, true) => cast_stop(db, voter_id, challenge_id),
        (Ballot::Stop, false) => retract_stop(db, voter_id, challenge_id),
    }
}

fn load_challenge(db: &Database, challenge_id: &str) -> Result<Challenge> {
    db.get_challenge(challenge_id)?
        .ok_or_else(|| ChallengeError::challenge_not_found(challenge_id))
}

fn closed_check(db: &Database, challenge_id: &str) -> Result<Option<Rejection>> {
    let challenge = load_challenge(db, challenge_id)?;
    Ok(challenge.closed.then_some(Rejection::ChallengeClosed))
}

fn reject(voter_id: &str, challenge_id: &str, rejection: Rejection) -> LedgerOutcome {
    debug!("Ignoring ballot from {} on {}: {:?}", voter_id, challenge_id, rejection);
    LedgerOutcome::Rejected(rejection)
}
