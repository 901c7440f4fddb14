use assessment_core::model::{AnswerId, AnsweredQuestion, AssessmentAttempt, AttemptId, OptionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    attempt_id_from_i64, db_err, id_i64, map_attempt_row, question_id_from_i64, ser, u32_from_i64,
};
use crate::repository::{AnswerRepository, StorageError};

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn record_answer(
        &self,
        answer: &AnsweredQuestion,
    ) -> Result<(AnswerId, AssessmentAttempt), StorageError> {
        let attempt_id = id_i64("attempt_id", answer.attempt_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let advanced = sqlx::query(
            r"
            UPDATE assessment_attempts
            SET next_question_index = next_question_index + 1
            WHERE id = ?1 AND is_ended = 0
            ",
        )
        .bind(attempt_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if advanced.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM assessment_attempts WHERE id = ?1")
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
            return Err(match exists {
                Some(_) => StorageError::Conflict,
                None => StorageError::NotFound,
            });
        }

        let res = sqlx::query(
            r"
            INSERT INTO answered_questions (
                attempt_id, question_id, question_index, option_id, answered_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(attempt_id)
        .bind(id_i64("question_id", answer.question_id.value())?)
        .bind(i64::from(answer.question_index))
        .bind(id_i64("option_id", answer.option_id.value())?)
        .bind(answer.answered_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let row = sqlx::query(
            r"
            SELECT id, assessment_id, is_ended, started_at, ended_at,
                   remaining_seconds, next_question_index, last_healthcheck_at
            FROM assessment_attempts WHERE id = ?1
            ",
        )
        .bind(attempt_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let attempt = map_attempt_row(&row)?;

        tx.commit().await.map_err(db_err)?;

        let answer_id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok((AnswerId::new(answer_id), attempt))
    }

    async fn list_answers(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT attempt_id, question_id, question_index, option_id, answered_at
            FROM answered_questions
            WHERE attempt_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let option_id: i64 = row.try_get("option_id").map_err(ser)?;
            out.push(AnsweredQuestion::new(
                attempt_id_from_i64(row.try_get::<i64, _>("attempt_id").map_err(ser)?)?,
                question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
                u32_from_i64(
                    "question_index",
                    row.try_get::<i64, _>("question_index").map_err(ser)?,
                )?,
                OptionId::new(u64::try_from(option_id).map_err(ser)?),
                row.try_get("answered_at").map_err(ser)?,
            ));
        }
        Ok(out)
    }
}
