use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use gauntlet_db::Database;
use gauntlet_types::models::{Ballot, Challenge, ScoreboardEntry, VoteCategory};

use crate::error::{ChallengeError, Result};
use crate::ledger::{self, LedgerOutcome};
use crate::locks::ChallengeLocks;
use crate::{outcome, scoreboard};

/// Number of distinct stop-votes that closes a challenge.
pub const STOP_QUORUM: u32 = 2;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Open,
    Closed,
}

impl ChallengeState {
    pub fn of(challenge: &Challenge) -> Self {
        if challenge.closed {
            Self::Closed
        } else {
            Self::Open
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotAction {
    Cast,
    Retract,
}

/// Participants of a challenge that was just announced.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub announcement_id: String,
    pub channel_id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub defender_id: String,
    pub defender_name: String,
}

/// Result of routing one reaction through the ledger.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub ledger: LedgerOutcome,
    /// Challenge state after the ballot was handled.
    pub challenge: Challenge,
    /// True only for the single call that closed the challenge and pushed its score.
    pub closed_now: bool,
}

/// Owns the open → closed transition of every challenge.
///
/// Ballots on one challenge are serialized through [`ChallengeLocks`];
/// ballots on different challenges run in parallel. Store work runs on the
/// blocking pool, bounded by `store_timeout`.
#[derive(Clone)]
pub struct Arbiter {
    inner: Arc<ArbiterInner>,
}

struct ArbiterInner {
    db: Arc<Database>,
    locks: ChallengeLocks,
    store_timeout: Duration,
    quorum: u32,
}

impl Arbiter {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_timeout(db, DEFAULT_STORE_TIMEOUT)
    }

    pub fn with_timeout(db: Arc<Database>, store_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ArbiterInner {
                db,
                locks: ChallengeLocks::new(),
                store_timeout,
                quorum: STOP_QUORUM,
            }),
        }
    }

    /// Seed a challenge and both participants' scoreboard entries.
    /// A repeated announcement ID leaves the existing challenge untouched.
    pub async fn on_challenge_created(&self, new: NewChallenge) -> Result<Challenge> {
        let id = new.announcement_id.clone();
        self.run_locked(&id, move |db| {
            let inserted = db.insert_challenge(
                &new.announcement_id,
                &new.channel_id,
                &new.challenger_id,
                &new.challenger_name,
                &new.defender_id,
                &new.defender_name,
            )?;
            if inserted {
                info!(
                    "Challenge {} opened: {} vs {}",
                    new.announcement_id, new.challenger_name, new.defender_name
                );
            } else {
                warn!("Challenge {} already exists, keeping stored state", new.announcement_id);
            }

            scoreboard::ensure_entry(db, &new.challenger_id, &new.challenger_name)?;
            scoreboard::ensure_entry(db, &new.defender_id, &new.defender_name)?;

            db.get_challenge(&new.announcement_id)?
                .ok_or_else(|| ChallengeError::challenge_not_found(&new.announcement_id))
        })
        .await
    }

    /// Route a reaction add (`Cast`) or removal (`Retract`) through the
    /// ledger, re-derive the outcome, and close the challenge if this ballot
    /// completed the stop quorum.
    pub async fn handle_ballot(
        &self,
        voter_id: &str,
        challenge_id: &str,
        ballot: Ballot,
        action: BallotAction,
    ) -> Result<Settlement> {
        let quorum = self.inner.quorum;
        let voter = voter_id.to_string();
        let id = challenge_id.to_string();
        self.run_locked(challenge_id, move |db| {
            settle(db, quorum, &voter, &id, ballot, action)
        })
        .await
    }

    pub async fn challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        let id = challenge_id.to_string();
        self.run(move |db| Ok(db.get_challenge(&id)?)).await
    }

    pub async fn scoreboard_entry(&self, user_id: &str) -> Result<Option<ScoreboardEntry>> {
        let id = user_id.to_string();
        self.run(move |db| scoreboard::entry(db, &id)).await
    }

    async fn run_locked<T, F>(&self, challenge_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.inner.locks.acquire(challenge_id).await;
        // The guard moves into the blocking task so a timed-out unit keeps
        // the challenge locked until its store work actually finishes.
        self.run(move |db| {
            let _guard = guard;
            f(db)
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.inner.db.clone();
        let task = tokio::task::spawn_blocking(move || f(&db));

        match tokio::time::timeout(self.inner.store_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("spawn_blocking join error: {}", e);
                Err(ChallengeError::StoreUnavailable(format!("store task failed: {}", e)))
            }
            Err(_) => {
                warn!("Store operation exceeded {:?}", self.inner.store_timeout);
                Err(ChallengeError::StoreUnavailable(format!(
                    "store timed out after {:?}",
                    self.inner.store_timeout
                )))
            }
        }
    }
}

fn settle(
    db: &Database,
    quorum: u32,
    voter_id: &str,
    challenge_id: &str,
    ballot: Ballot,
    action: BallotAction,
) -> Result<Settlement> {
    let ledger = ledger::apply(db, voter_id, challenge_id, ballot, action == BallotAction::Cast)?;

    if ledger.is_applied() {
        if let Ballot::Vote(category) = ballot {
            if category.affects_outcome() {
                outcome::recompute_outcome(db, challenge_id)?;
            }
        }
    }

    // Only one caller ever gets the closed challenge back. A failure rolls
    // the close back, so the next ballot retries it.
    let (challenge, closed_now) = match scoreboard::close_and_push(db, challenge_id, quorum)? {
        Some(challenge) => {
            info!("Challenge {} reached {} stop votes, closed", challenge_id, quorum);
            if let Err(e) = tallies_match(db, &challenge) {
                warn!("Could not audit closed challenge {}: {}", challenge_id, e);
            }
            (challenge, true)
        }
        None => {
            let challenge = db
                .get_challenge(challenge_id)?
                .ok_or_else(|| ChallengeError::challenge_not_found(challenge_id))?;
            (challenge, false)
        }
    };

    debug!(
        "{} {:?} {:?} on {} -> {:?} ({:?})",
        voter_id,
        action,
        ballot,
        challenge_id,
        ledger,
        ChallengeState::of(&challenge)
    );

    Ok(Settlement {
        ledger,
        challenge,
        closed_now,
    })
}

/// Check the stored tallies against the ledger rows, warning on drift.
fn tallies_match(db: &Database, challenge: &Challenge) -> Result<bool> {
    let counts = db.count_ballots(&challenge.message_id)?;
    let votes_match = [
        (VoteCategory::Challenger, counts.challenger),
        (VoteCategory::Defender, counts.defender),
        (VoteCategory::Abstain, counts.abstain),
    ]
    .into_iter()
    .all(|(category, recorded)| challenge.tally(category) == recorded);

    let consistent = votes_match && challenge.stop_votes == counts.stop;
    if !consistent {
        warn!(
            "Tally drift on {}: stored {}/{}/{}/{} vs ledger {}/{}/{}/{}",
            challenge.message_id,
            challenge.challenger_votes,
            challenge.defender_votes,
            challenge.abstain_votes,
            challenge.stop_votes,
            counts.challenger,
            counts.defender,
            counts.abstain,
            counts.stop
        );
    }
    Ok(consistent)
}
