use tracing::debug;

use gauntlet_db::Database;
use gauntlet_types::models::Outcome;

use crate::error::{ChallengeError, Result};

/// Re-derive a challenge's outcome from its current challenger and
/// defender tallies. Writes only when the stored value differs.
pub fn recompute_outcome(db: &Database, challenge_id: &str) -> Result<Outcome> {
    let challenge = db
        .get_challenge(challenge_id)?
        .ok_or_else(|| ChallengeError::challenge_not_found(challenge_id))?;

    let outcome = Outcome::from_tally(challenge.challenger_votes, challenge.defender_votes);
    if outcome != challenge.outcome {
        db.set_outcome(challenge_id, outcome)?;
        debug!(
            "Outcome of {} is now {:?} ({} to {})",
            challenge_id, outcome, challenge.challenger_votes, challenge.defender_votes
        );
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_types::models::{Ballot, VoteCategory};

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_challenge("m1", "c1", "u1", "gabe", "u2", "miia").unwrap();
        db
    }

    fn bump(db: &Database, category: VoteCategory, by: i64) {
        assert!(db.adjust_tally("m1", Ballot::Vote(category), by).unwrap());
    }

    #[test]
    fn follows_challenger_and_defender_tallies() {
        let db = seeded();
        assert_eq!(recompute_outcome(&db, "m1").unwrap(), Outcome::Tie);

        bump(&db, VoteCategory::Challenger, 2);
        bump(&db, VoteCategory::Defender, 1);
        assert_eq!(recompute_outcome(&db, "m1").unwrap(), Outcome::ChallengerWin);

        bump(&db, VoteCategory::Defender, 2);
        assert_eq!(recompute_outcome(&db, "m1").unwrap(), Outcome::DefenderWin);
        assert_eq!(db.get_challenge("m1").unwrap().unwrap().outcome, Outcome::DefenderWin);

        bump(&db, VoteCategory::Challenger, 1);
        assert_eq!(recompute_outcome(&db, "m1").unwrap(), Outcome::Tie);
    }

    #[test]
    fn abstentions_do_not_move_outcome() {
        let db = seeded();
        bump(&db, VoteCategory::Abstain, 5);
        assert_eq!(recompute_outcome(&db, "m1").unwrap(), Outcome::Tie);
    }

    #[test]
    fn is_idempotent() {
        let db = seeded();
        bump(&db, VoteCategory::Defender, 1);
        let first = recompute_outcome(&db, "m1").unwrap();
        let second = recompute_outcome(&db, "m1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Outcome::DefenderWin);
    }

    #[test]
    fn missing_challenge_is_not_found() {
        let db = seeded();
        assert!(recompute_outcome(&db, "nope").unwrap_err().is_not_found());
    }
}
