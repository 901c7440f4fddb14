use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL,
            slug TEXT NOT NULL,
            title TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 1,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT ''
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            question_text TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS question_options (
            id INTEGER PRIMARY KEY,
            question_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            answer_text TEXT NOT NULL,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
            FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS assessments (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
            question_count INTEGER NOT NULL CHECK (question_count > 0),
            ordering TEXT NOT NULL,
            info TEXT,
            test_type INTEGER,
            attempts_started INTEGER NOT NULL DEFAULT 0 CHECK (attempts_started >= 0),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS assessment_questions (
            assessment_id TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            question_id INTEGER NOT NULL,
            PRIMARY KEY (assessment_id, position),
            FOREIGN KEY (assessment_id) REFERENCES assessments(id) ON DELETE CASCADE,
            FOREIGN KEY (question_id) REFERENCES questions(id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS assessment_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assessment_id TEXT NOT NULL,
            is_ended INTEGER NOT NULL DEFAULT 0 CHECK (is_ended IN (0, 1)),
            started_at TEXT NOT NULL,
            ended_at TEXT,
            remaining_seconds INTEGER NOT NULL,
            next_question_index INTEGER NOT NULL DEFAULT 0 CHECK (next_question_index >= 0),
            last_healthcheck_at TEXT NOT NULL,
            FOREIGN KEY (assessment_id) REFERENCES assessments(id) ON DELETE CASCADE
        );
    ",
    // At most one in-progress attempt per assessment.
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS uniq_assessment_attempts_active
            ON assessment_attempts (assessment_id)
            WHERE is_ended = 0;
    ",
    r"
        CREATE TABLE IF NOT EXISTS answered_questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            attempt_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            question_index INTEGER NOT NULL CHECK (question_index >= 1),
            option_id INTEGER NOT NULL,
            answered_at TEXT NOT NULL,
            UNIQUE (attempt_id, question_index),
            FOREIGN KEY (attempt_id) REFERENCES assessment_attempts(id) ON DELETE CASCADE,
            FOREIGN KEY (question_id) REFERENCES questions(id)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_question_options_question_position
            ON question_options (question_id, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_assessment_attempts_assessment_started
            ON assessment_attempts (assessment_id, started_at, id);
    ",
];

/// Runs versioned migrations for the current schema.
///
/// Each version runs in its own transaction and is recorded in
/// `schema_migrations`, so calling this repeatedly is safe.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: users, question bank, assessments, attempts, answers.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1.iter().copied() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
