use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (challenges, scoreboard, vote records)");
        conn.execute_batch(
            "
            CREATE TABLE challenges (
                message_id       TEXT PRIMARY KEY,
                channel_id       TEXT NOT NULL,
                challenger_id    TEXT NOT NULL,
                challenger_name  TEXT NOT NULL,
                defender_id      TEXT NOT NULL,
                defender_name    TEXT NOT NULL,
                challenger_votes INTEGER NOT NULL DEFAULT 0 CHECK (challenger_votes >= 0),
                defender_votes   INTEGER NOT NULL DEFAULT 0 CHECK (defender_votes >= 0),
                abstain_votes    INTEGER NOT NULL DEFAULT 0 CHECK (abstain_votes >= 0),
                stop_votes       INTEGER NOT NULL DEFAULT 0 CHECK (stop_votes >= 0),
                -- 0 = tie, 1 = challenger wins, 2 = defender wins
                outcome          INTEGER NOT NULL DEFAULT 0,
                closed           INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL DEFAULT (datetime('now')),
                closed_at        TEXT
            );

            CREATE TABLE scoreboard (
                user_id               TEXT PRIMARY KEY,
                username              TEXT NOT NULL,
                total_challenge_wins   INTEGER NOT NULL DEFAULT 0,
                total_challenge_losses INTEGER NOT NULL DEFAULT 0,
                total_challenge_ties   INTEGER NOT NULL DEFAULT 0,
                total_challenges       INTEGER NOT NULL DEFAULT 0,
                successful_challenges  INTEGER NOT NULL DEFAULT 0,
                failed_challenges      INTEGER NOT NULL DEFAULT 0,
                successful_defenses    INTEGER NOT NULL DEFAULT 0,
                failed_defenses        INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE vote_records (
                voter_id     TEXT NOT NULL,
                challenge_id TEXT NOT NULL REFERENCES challenges(message_id),
                category     TEXT CHECK (category IN ('challenger', 'defender', 'abstain')),
                stopped      INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (voter_id, challenge_id)
            );

            CREATE INDEX idx_vote_records_challenge
                ON vote_records(challenge_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
