use thiserror::Error;

use crate::model::ids::{AssessmentId, QuestionId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("duration must be > 0 minutes")]
    InvalidDuration,

    #[error("question count must be > 0")]
    InvalidQuestionCount,

    #[error("assessment expects {expected} questions, {assigned} were assigned")]
    AssignmentSizeMismatch { expected: u32, assigned: usize },

    #[error("question index {index} is outside 1..={count}")]
    IndexOutOfRange { index: i64, count: u32 },
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// How random slots are drawn from the question pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandomDraw {
    /// Each slot is an independent draw; a question may fill several slots.
    #[default]
    WithReplacement,
    /// Every slot holds a distinct question.
    WithoutReplacement,
}

/// Question ordering chosen when an assessment is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOrdering {
    /// Slots are filled from the pool in ascending id order.
    Sequential,
    Random { draw: RandomDraw },
}

impl Default for QuestionOrdering {
    fn default() -> Self {
        Self::Random {
            draw: RandomDraw::default(),
        }
    }
}

impl QuestionOrdering {
    #[must_use]
    pub fn is_sequential(self) -> bool {
        matches!(self, Self::Sequential)
    }
}

/// Configuration of an assessment, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentSettings {
    duration_minutes: u32,
    question_count: u32,
    ordering: QuestionOrdering,
    info: Option<String>,
    test_type: Option<i32>,
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 60,
            question_count: 15,
            ordering: QuestionOrdering::default(),
            info: None,
            test_type: None,
        }
    }
}

impl AssessmentSettings {
    /// Creates validated settings.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if the duration or question count is zero.
    pub fn new(
        duration_minutes: u32,
        question_count: u32,
        ordering: QuestionOrdering,
    ) -> Result<Self, AssessmentError> {
        if duration_minutes == 0 {
            return Err(AssessmentError::InvalidDuration);
        }
        if question_count == 0 {
            return Err(AssessmentError::InvalidQuestionCount);
        }
        Ok(Self {
            duration_minutes,
            question_count,
            ordering,
            info: None,
            test_type: None,
        })
    }

    #[must_use]
    pub fn with_info(mut self, info: Option<String>) -> Self {
        self.info = info;
        self
    }

    #[must_use]
    pub fn with_test_type(mut self, test_type: Option<i32>) -> Self {
        self.test_type = test_type;
        self
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn ordering(&self) -> QuestionOrdering {
        self.ordering
    }

    #[must_use]
    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    #[must_use]
    pub fn test_type(&self) -> Option<i32> {
        self.test_type
    }

    /// Full time budget of one attempt, in seconds.
    #[must_use]
    pub fn total_seconds(&self) -> i64 {
        i64::from(self.duration_minutes) * 60
    }
}

//
// ─── ASSESSMENT ────────────────────────────────────────────────────────────────
//

/// Aggregate root for a configured quiz.
///
/// Question slots are fixed at creation; the only later mutation is the
/// attempt counter, which storage bumps when it begins an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    id: AssessmentId,
    owner: UserId,
    settings: AssessmentSettings,
    question_ids: Vec<QuestionId>,
    attempts_started: u32,
}

impl Assessment {
    /// Creates an assessment with its assigned questions in slot order.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AssignmentSizeMismatch` if the number of
    /// assigned questions differs from `question_count`.
    pub fn new(
        id: AssessmentId,
        owner: UserId,
        settings: AssessmentSettings,
        question_ids: Vec<QuestionId>,
    ) -> Result<Self, AssessmentError> {
        Self::from_persisted(id, owner, settings, question_ids, 0)
    }

    /// Rehydrate an assessment from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AssignmentSizeMismatch` if the stored slots do
    /// not match the stored question count.
    pub fn from_persisted(
        id: AssessmentId,
        owner: UserId,
        settings: AssessmentSettings,
        question_ids: Vec<QuestionId>,
        attempts_started: u32,
    ) -> Result<Self, AssessmentError> {
        let expected = settings.question_count();
        if usize::try_from(expected).ok() != Some(question_ids.len()) {
            return Err(AssessmentError::AssignmentSizeMismatch {
                expected,
                assigned: question_ids.len(),
            });
        }
        Ok(Self {
            id,
            owner,
            settings,
            question_ids,
            attempts_started,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn attempts_started(&self) -> u32 {
        self.attempts_started
    }

    /// Bumps the started-attempts counter.
    pub fn count_attempt(&mut self) {
        self.attempts_started = self.attempts_started.saturating_add(1);
    }

    /// Resolves the question in the given 1-based slot.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::IndexOutOfRange` unless `1 <= index <= question_count`.
    pub fn question_at(&self, index: i64) -> Result<QuestionId, AssessmentError> {
        let out_of_range = AssessmentError::IndexOutOfRange {
            index,
            count: self.settings.question_count(),
        };
        let slot = index
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| out_of_range.clone())?;
        self.question_ids.get(slot).copied().ok_or(out_of_range)
    }
}
