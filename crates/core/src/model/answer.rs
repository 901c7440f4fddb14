use chrono::{DateTime, Utc};

use crate::model::ids::{AttemptId, OptionId, QuestionId};

/// Record of a single answer submission within an attempt.
///
/// `question_index` is the 1-based slot the caller answered; an attempt holds
/// at most one record per slot. Records are append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredQuestion {
    pub attempt_id: AttemptId,
    pub question_id: QuestionId,
    pub question_index: u32,
    pub option_id: OptionId,
    pub answered_at: DateTime<Utc>,
}

impl AnsweredQuestion {
    #[must_use]
    pub fn new(
        attempt_id: AttemptId,
        question_id: QuestionId,
        question_index: u32,
        option_id: OptionId,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            question_id,
            question_index,
            option_id,
            answered_at,
        }
    }
}
