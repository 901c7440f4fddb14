use assessment_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_user_row, user_id_from_i64};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_new_user(&self, user: &User) -> Result<User, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO users (uuid, slug, title, status, first_name, last_name, email)
            VALUES (?1, '', ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(user.uuid().to_string())
        .bind(user.title())
        .bind(user.status())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.email())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        // The slug embeds the row id, so it is written once the id is known.
        let stored = user
            .clone()
            .with_id(user_id_from_i64(res.last_insert_rowid())?);
        sqlx::query("UPDATE users SET slug = ?1 WHERE id = ?2")
            .bind(stored.slug())
            .bind(res.last_insert_rowid())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(stored)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, uuid, slug, title, status, first_name, last_name, email
            FROM users WHERE id = ?1
            ",
        )
        .bind(id_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }
}
