//! Shared error types for the services crate.

use thiserror::Error;

use assessment_core::model::{
    AssessmentError, AssessmentId, AttemptError, OptionId, QuestionError, QuestionId, UserError,
    UserId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Internal,
}

impl ErrorKind {
    fn of_storage(err: &StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::Conflict => Self::Conflict,
            _ => Self::Internal,
        }
    }
}

/// Errors emitted by `AttemptService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptServiceError {
    #[error("assessment {0} does not exist")]
    AssessmentNotFound(AssessmentId),
    #[error("no assessment attempt found")]
    NoActiveAttempt(AssessmentId),
    #[error("attempt changed state concurrently, retry the request")]
    ConcurrentTransition(AssessmentId),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AttemptServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AssessmentNotFound(_) | Self::NoActiveAttempt(_) => ErrorKind::NotFound,
            Self::ConcurrentTransition(_) | Self::Attempt(_) => ErrorKind::Conflict,
            Self::Storage(err) => ErrorKind::of_storage(err),
        }
    }
}

/// Errors emitted by `ProgressionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("assessment {0} does not exist")]
    AssessmentNotFound(AssessmentId),
    #[error("no assessment attempt found")]
    NoActiveAttempt(AssessmentId),
    #[error("question {0} is missing from the question bank")]
    QuestionMissing(QuestionId),
    #[error("option {option_id} does not belong to question {question_id}")]
    UnknownOption {
        question_id: QuestionId,
        option_id: OptionId,
    },
    #[error("expected an answer for question {expected}, got {index}")]
    OutOfOrder { expected: u32, index: u32 },
    #[error("question {0} was already answered in this attempt")]
    AlreadyAnswered(u32),
    #[error(transparent)]
    Index(#[from] AssessmentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AssessmentNotFound(_) | Self::NoActiveAttempt(_) | Self::QuestionMissing(_) => {
                ErrorKind::NotFound
            }
            Self::UnknownOption { .. } | Self::OutOfOrder { .. } | Self::Index(_) => {
                ErrorKind::BadRequest
            }
            Self::AlreadyAnswered(_) => ErrorKind::Conflict,
            Self::Storage(err) => ErrorKind::of_storage(err),
        }
    }
}

/// Errors emitted while picking questions for a new assessment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssignmentError {
    #[error("question pool holds {available} questions, {requested} are needed")]
    InsufficientQuestions { requested: u32, available: usize },
}

/// Errors emitted by `AssessmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentServiceError {
    #[error("specified user ID does not exist")]
    UserNotFound(UserId),
    #[error("assessment {0} does not exist")]
    AssessmentNotFound(AssessmentId),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AssessmentServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) | Self::AssessmentNotFound(_) => ErrorKind::NotFound,
            Self::Assessment(_) | Self::Assignment(_) => ErrorKind::BadRequest,
            Self::QuestionBank(_) => ErrorKind::Internal,
            Self::Storage(err) => ErrorKind::of_storage(err),
        }
    }
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error("user {0} does not exist")]
    NotFound(UserId),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UserServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::User(_) => ErrorKind::BadRequest,
            Self::Storage(err) => ErrorKind::of_storage(err),
        }
    }
}

/// Errors emitted by `QuestionBankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_their_kind() {
        let id = AssessmentId::generate();
        assert_eq!(
            AttemptServiceError::Storage(StorageError::Conflict).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AttemptServiceError::Storage(StorageError::Connection("down".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            AttemptServiceError::NoActiveAttempt(id).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn index_errors_are_bad_requests() {
        let err = ProgressionError::from(AssessmentError::IndexOutOfRange { index: 0, count: 3 });
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.to_string(), "question index 0 is outside 1..=3");
    }
}
