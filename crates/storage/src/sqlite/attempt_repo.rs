use assessment_core::model::{AssessmentAttempt, AssessmentId, AttemptDraft};
use chrono::{DateTime, Utc};

use super::SqliteRepository;
use super::mapping::{attempt_id_from_i64, db_err, id_i64, map_attempt_row};
use crate::repository::{AttemptRepository, StorageError};

const ATTEMPT_COLUMNS: &str = r"
    id, assessment_id, is_ended, started_at, ended_at,
    remaining_seconds, next_question_index, last_healthcheck_at
";

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn begin_attempt(&self, draft: AttemptDraft) -> Result<AssessmentAttempt, StorageError> {
        let assessment_id = draft.assessment_id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let bumped = sqlx::query(
            "UPDATE assessments SET attempts_started = attempts_started + 1 WHERE id = ?1",
        )
        .bind(assessment_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if bumped.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        // The partial unique index rejects a second in-progress attempt; the
        // transaction rolls the counter bump back on drop.
        let res = sqlx::query(
            r"
            INSERT INTO assessment_attempts (
                assessment_id, is_ended, started_at, ended_at,
                remaining_seconds, next_question_index, last_healthcheck_at
            )
            VALUES (?1, 0, ?2, NULL, ?3, 0, ?2)
            ",
        )
        .bind(assessment_id.as_str())
        .bind(draft.started_at)
        .bind(draft.remaining_seconds)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(draft.into_attempt(attempt_id_from_i64(res.last_insert_rowid())?))
    }

    async fn current_attempt(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Option<AssessmentAttempt>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE assessment_id = ?1 AND is_ended = 0"
        );
        let row = sqlx::query(&sql)
            .bind(assessment_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn update_active_attempt(
        &self,
        attempt: &AssessmentAttempt,
        read_baseline: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let id = id_i64("attempt_id", attempt.id().value())?;
        let res = sqlx::query(
            r"
            UPDATE assessment_attempts
            SET is_ended = ?2,
                ended_at = ?3,
                remaining_seconds = ?4,
                last_healthcheck_at = ?5
            WHERE id = ?1 AND is_ended = 0 AND last_healthcheck_at = ?6
            ",
        )
        .bind(id)
        .bind(i64::from(attempt.is_ended()))
        .bind(attempt.ended_at())
        .bind(attempt.remaining_seconds())
        .bind(attempt.last_healthcheck_at())
        .bind(read_baseline)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query("SELECT 1 FROM assessment_attempts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StorageError::NotFound),
        }
    }

    async fn list_attempts(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM assessment_attempts WHERE assessment_id = ?1 ORDER BY started_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(assessment_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_attempt_row).collect()
    }
}
