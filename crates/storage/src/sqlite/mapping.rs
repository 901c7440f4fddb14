use assessment_core::model::{
    AssessmentAttempt, AssessmentId, AttemptId, QuestionId, QuestionOrdering, RandomDraw, User,
    UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps constraint violations onto domain-level storage errors.
///
/// Unique violations become `Conflict` and foreign key violations `NotFound`;
/// everything else is a connection-level failure.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn assessment_id_from_str(s: &str) -> Result<AssessmentId, StorageError> {
    s.parse().map_err(ser)
}

/// Storage encoding for `QuestionOrdering`.
pub(crate) fn ordering_to_str(ordering: QuestionOrdering) -> &'static str {
    match ordering {
        QuestionOrdering::Sequential => "sequential",
        QuestionOrdering::Random {
            draw: RandomDraw::WithReplacement,
        } => "random",
        QuestionOrdering::Random {
            draw: RandomDraw::WithoutReplacement,
        } => "random_distinct",
    }
}

/// Inverse of `ordering_to_str`.
pub(crate) fn parse_ordering(s: &str) -> Result<QuestionOrdering, StorageError> {
    match s {
        "sequential" => Ok(QuestionOrdering::Sequential),
        "random" => Ok(QuestionOrdering::Random {
            draw: RandomDraw::WithReplacement,
        }),
        "random_distinct" => Ok(QuestionOrdering::Random {
            draw: RandomDraw::WithoutReplacement,
        }),
        _ => Err(StorageError::Serialization(format!("invalid ordering: {s}"))),
    }
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let uuid: String = row.try_get("uuid").map_err(ser)?;
    Ok(User::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        Uuid::parse_str(&uuid).map_err(ser)?,
        row.try_get("slug").map_err(ser)?,
        row.try_get("title").map_err(ser)?,
        row.try_get("status").map_err(ser)?,
        row.try_get("first_name").map_err(ser)?,
        row.try_get("last_name").map_err(ser)?,
        row.try_get("email").map_err(ser)?,
    ))
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<AssessmentAttempt, StorageError> {
    let assessment_id: String = row.try_get("assessment_id").map_err(ser)?;
    let next_index = row.try_get::<i64, _>("next_question_index").map_err(ser)?;

    AssessmentAttempt::from_persisted(
        attempt_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        assessment_id_from_str(&assessment_id)?,
        row.try_get::<i64, _>("is_ended").map_err(ser)? != 0,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("ended_at").map_err(ser)?,
        row.try_get("remaining_seconds").map_err(ser)?,
        u32_from_i64("next_question_index", next_index)?,
        row.try_get("last_healthcheck_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_encoding_round_trips() {
        for ordering in [
            QuestionOrdering::Sequential,
            QuestionOrdering::Random {
                draw: RandomDraw::WithReplacement,
            },
            QuestionOrdering::Random {
                draw: RandomDraw::WithoutReplacement,
            },
        ] {
            assert_eq!(parse_ordering(ordering_to_str(ordering)).unwrap(), ordering);
        }
        assert!(parse_ordering("shuffled").is_err());
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(user_id_from_i64(-1).is_err());
        assert!(id_i64("id", u64::MAX).is_err());
    }
}
