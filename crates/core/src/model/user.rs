use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user title cannot be empty")]
    EmptyTitle,
}

/// Owner of assessments.
///
/// The assessment core only ever uses the id as an owner reference; the
/// remaining profile fields are carried so the user resource can be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    uuid: Uuid,
    slug: String,
    title: String,
    status: i32,
    first_name: String,
    last_name: String,
    email: String,
}

impl User {
    /// Default title given to users created without a profile.
    pub const DEFAULT_TITLE: &'static str = "Data Scientist";

    /// Creates a user with the given title and an empty profile.
    ///
    /// The slug is derived from the title and id, e.g. `data-scientist-7`.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyTitle` if the title is blank.
    pub fn new(id: UserId, uuid: Uuid, title: impl Into<String>) -> Result<Self, UserError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(UserError::EmptyTitle);
        }
        Ok(Self {
            id,
            uuid,
            slug: slug_for(&title, id),
            title,
            status: 1,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        })
    }

    /// Rehydrate a user from persisted storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: UserId,
        uuid: Uuid,
        slug: String,
        title: String,
        status: i32,
        first_name: String,
        last_name: String,
        email: String,
    ) -> Self {
        Self {
            id,
            uuid,
            slug,
            title,
            status,
            first_name,
            last_name,
            email,
        }
    }

    /// Returns a copy of this user carrying a storage-assigned id.
    ///
    /// The slug embeds the id, so it is recomputed.
    #[must_use]
    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = id;
        self.slug = slug_for(&self.title, id);
        self
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn status(&self) -> i32 {
        self.status
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

fn slug_for(title: &str, id: UserId) -> String {
    format!("{}-{}", title.trim().to_lowercase().replace(' ', "-"), id)
}
