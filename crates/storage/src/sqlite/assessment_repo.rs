use assessment_core::model::{Assessment, AssessmentId, AssessmentSettings, QuestionId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    db_err, id_i64, ordering_to_str, parse_ordering, question_id_from_i64, ser, u32_from_i64,
    user_id_from_i64,
};
use crate::repository::{AssessmentRepository, StorageError};

#[async_trait::async_trait]
impl AssessmentRepository for SqliteRepository {
    async fn insert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let id = assessment.id().to_string();
        let settings = assessment.settings();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO assessments (
                id, user_id, duration_minutes, question_count, ordering,
                info, test_type, attempts_started
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(id.as_str())
        .bind(id_i64("user_id", assessment.owner().value())?)
        .bind(i64::from(settings.duration_minutes()))
        .bind(i64::from(settings.question_count()))
        .bind(ordering_to_str(settings.ordering()))
        .bind(settings.info())
        .bind(settings.test_type())
        .bind(i64::from(assessment.attempts_started()))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for (position, question_id) in assessment.question_ids().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO assessment_questions (assessment_id, position, question_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(id.as_str())
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(id_i64("question_id", question_id.value())?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, StorageError> {
        let id = id.to_string();
        let row = sqlx::query(
            r"
            SELECT id, user_id, duration_minutes, question_count, ordering,
                   info, test_type, attempts_started
            FROM assessments WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let slots = sqlx::query(
            r"
            SELECT question_id FROM assessment_questions
            WHERE assessment_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let question_ids = slots
            .iter()
            .map(|slot| question_id_from_i64(slot.try_get::<i64, _>("question_id").map_err(ser)?))
            .collect::<Result<Vec<_>, _>>()?;

        assessment_from_row(&row, question_ids).map(Some)
    }
}

fn assessment_from_row(
    row: &SqliteRow,
    question_ids: Vec<QuestionId>,
) -> Result<Assessment, StorageError> {
    let ordering: String = row.try_get("ordering").map_err(ser)?;
    let settings = AssessmentSettings::new(
        u32_from_i64(
            "duration_minutes",
            row.try_get::<i64, _>("duration_minutes").map_err(ser)?,
        )?,
        u32_from_i64(
            "question_count",
            row.try_get::<i64, _>("question_count").map_err(ser)?,
        )?,
        parse_ordering(&ordering)?,
    )
    .map_err(ser)?
    .with_info(row.try_get("info").map_err(ser)?)
    .with_test_type(row.try_get("test_type").map_err(ser)?);

    let id: String = row.try_get("id").map_err(ser)?;
    Assessment::from_persisted(
        id.parse().map_err(ser)?,
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        settings,
        question_ids,
        u32_from_i64(
            "attempts_started",
            row.try_get::<i64, _>("attempts_started").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}
