use assessment_core::model::{OptionId, Question, QuestionId, QuestionOption};
use sqlx::{Row, Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, question_id_from_i64, ser};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let question_id = id_i64("question_id", question.id().value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO questions (id, question_text)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET question_text = excluded.question_text
            ",
        )
        .bind(question_id)
        .bind(question.text())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("DELETE FROM question_options WHERE question_id = ?1")
            .bind(question_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        insert_options(&mut tx, question_id, question).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn insert_question_if_absent(&self, question: &Question) -> Result<bool, StorageError> {
        let question_id = id_i64("question_id", question.id().value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO questions (id, question_text)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(question_id)
        .bind(question.text())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(db_err)?;
            return Ok(false);
        }

        insert_options(&mut tx, question_id, question).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let question_id = id_i64("question_id", id.value())?;
        let Some(row) = sqlx::query("SELECT id, question_text FROM questions WHERE id = ?1")
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let option_rows = sqlx::query(
            r"
            SELECT id, answer_text, is_correct
            FROM question_options
            WHERE question_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut options = Vec::with_capacity(option_rows.len());
        for option in option_rows {
            let option_id: i64 = option.try_get("id").map_err(ser)?;
            options.push(QuestionOption::new(
                OptionId::new(u64::try_from(option_id).map_err(ser)?),
                option.try_get::<String, _>("answer_text").map_err(ser)?,
                option.try_get::<i64, _>("is_correct").map_err(ser)? != 0,
            ));
        }

        Question::new(
            question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
            row.try_get::<String, _>("question_text").map_err(ser)?,
            options,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn list_question_ids(&self) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM questions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?))
            .collect()
    }
}

async fn insert_options(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
    question: &Question,
) -> Result<(), StorageError> {
    for (position, option) in question.options().iter().enumerate() {
        sqlx::query(
            r"
            INSERT INTO question_options (id, question_id, position, answer_text, is_correct)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("option_id", option.id.value())?)
        .bind(question_id)
        .bind(i64::try_from(position).map_err(ser)?)
        .bind(option.label.as_str())
        .bind(i64::from(option.is_correct))
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}
