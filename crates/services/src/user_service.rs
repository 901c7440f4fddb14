use std::sync::Arc;

use assessment_core::model::{User, UserId};
use storage::repository::UserRepository;
use tracing::info;
use uuid::Uuid;

use crate::error::UserServiceError;

/// Creates and looks up assessment owners.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Create a user with the default title and a fresh UUID.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` if persistence fails.
    pub async fn create_user(&self) -> Result<User, UserServiceError> {
        let draft = User::new(UserId::new(0), Uuid::new_v4(), User::DEFAULT_TITLE)?;
        let user = self.users.insert_new_user(&draft).await?;
        info!(user_id = %user.id(), slug = user.slug(), "user created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::NotFound` if the user does not exist.
    pub async fn get_user(&self, id: UserId) -> Result<User, UserServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or(UserServiceError::NotFound(id))
    }
}
