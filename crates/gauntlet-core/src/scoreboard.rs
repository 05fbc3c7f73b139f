use tracing::info;

use gauntlet_db::Database;
use gauntlet_types::models::{Challenge, Outcome, ScoreDelta, ScoreboardEntry};

use crate::error::Result;

/// Per-participant increments for a finalized outcome: (challenger, defender).
pub fn deltas_for(outcome: Outcome) -> (ScoreDelta, ScoreDelta) {
    match outcome {
        Outcome::ChallengerWin => (
            ScoreDelta {
                wins: 1,
                successful_challenges: 1,
                ..ScoreDelta::default()
            },
            ScoreDelta {
                losses: 1,
                failed_defenses: 1,
                ..ScoreDelta::default()
            },
        ),
        Outcome::DefenderWin => (
            ScoreDelta {
                losses: 1,
                failed_challenges: 1,
                ..ScoreDelta::default()
            },
            ScoreDelta {
                wins: 1,
                successful_defenses: 1,
                ..ScoreDelta::default()
            },
        ),
        Outcome::Tie => {
            let tie = ScoreDelta {
                ties: 1,
                ..ScoreDelta::default()
            };
            (tie, tie)
        }
    }
}

/// Lazily create a participant's entry. Existing entries are left alone.
pub fn ensure_entry(db: &Database, user_id: &str, username: &str) -> Result<bool> {
    let created = db.insert_scoreboard_entry(user_id, username)?;
    if created {
        info!("Scoreboard entry created for {} ({})", username, user_id);
    }
    Ok(created)
}

pub fn entry(db: &Database, user_id: &str) -> Result<Option<ScoreboardEntry>> {
    Ok(db.get_scoreboard_entry(user_id)?)
}

/// Close the challenge if its stop tally reached `quorum` and apply its
/// outcome to both participants, in one transaction.
///
/// Returns `Some` only for the call that performed the close, so a result
/// is credited exactly once. Missing entries are recreated first.
pub fn close_and_push(db: &Database, challenge_id: &str, quorum: u32) -> Result<Option<Challenge>> {
    let closed = db.close_and_push(challenge_id, quorum, deltas_for)?;
    if let Some(challenge) = &closed {
        info!(
            "Pushed {:?} for {} ({} vs {})",
            challenge.outcome, challenge_id, challenge.challenger_name, challenge.defender_name
        );
    }
    Ok(closed)
}
