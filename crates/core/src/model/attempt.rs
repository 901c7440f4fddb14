use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::assessment::Assessment;
use crate::model::ids::{AssessmentId, AttemptId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt {0} has already ended")]
    AlreadyEnded(AttemptId),

    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("an ended attempt must carry an end time")]
    MissingEndTime,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle position of a single attempt.
///
/// The assessment-level `NO_ATTEMPT` state is the absence of an in-progress
/// attempt and is therefore not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    InProgress,
    Ended,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One timed sitting of an assessment.
///
/// Time is tracked lazily: `remaining_seconds` only changes when [`decay`]
/// is applied at a healthcheck, measured from `last_healthcheck_at`.
///
/// [`decay`]: AssessmentAttempt::decay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentAttempt {
    id: AttemptId,
    assessment_id: AssessmentId,
    is_ended: bool,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    remaining_seconds: i64,
    next_question_index: u32,
    last_healthcheck_at: DateTime<Utc>,
}

/// Values for an attempt that storage has not yet assigned an id to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptDraft {
    pub assessment_id: AssessmentId,
    pub remaining_seconds: i64,
    pub started_at: DateTime<Utc>,
}

impl AttemptDraft {
    /// A fresh attempt with the assessment's full time budget.
    #[must_use]
    pub fn for_assessment(assessment: &Assessment, now: DateTime<Utc>) -> Self {
        Self {
            assessment_id: assessment.id(),
            remaining_seconds: assessment.settings().total_seconds(),
            started_at: now,
        }
    }

    #[must_use]
    pub fn into_attempt(self, id: AttemptId) -> AssessmentAttempt {
        AssessmentAttempt {
            id,
            assessment_id: self.assessment_id,
            is_ended: false,
            started_at: self.started_at,
            ended_at: None,
            remaining_seconds: self.remaining_seconds,
            next_question_index: 0,
            last_healthcheck_at: self.started_at,
        }
    }
}

impl AssessmentAttempt {
    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::MissingEndTime` for an ended attempt without an
    /// end time, or `AttemptError::InvalidTimeRange` if it ends before it starts.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: AttemptId,
        assessment_id: AssessmentId,
        is_ended: bool,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        remaining_seconds: i64,
        next_question_index: u32,
        last_healthcheck_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if is_ended && ended_at.is_none() {
            return Err(AttemptError::MissingEndTime);
        }
        if ended_at.is_some_and(|end| end < started_at) {
            return Err(AttemptError::InvalidTimeRange);
        }

        Ok(Self {
            id,
            assessment_id,
            is_ended,
            started_at,
            ended_at,
            remaining_seconds,
            next_question_index,
            last_healthcheck_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.is_ended
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        if self.is_ended {
            AttemptState::Ended
        } else {
            AttemptState::InProgress
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Seconds left on the clock; negative once the budget is overrun.
    #[must_use]
    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds
    }

    /// 0-based slot of the next unanswered question.
    #[must_use]
    pub fn next_question_index(&self) -> u32 {
        self.next_question_index
    }

    #[must_use]
    pub fn last_healthcheck_at(&self) -> DateTime<Utc> {
        self.last_healthcheck_at
    }

    fn ensure_in_progress(&self) -> Result<(), AttemptError> {
        if self.is_ended {
            return Err(AttemptError::AlreadyEnded(self.id));
        }
        Ok(())
    }

    /// Re-arms the decay baseline without touching the remaining time.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyEnded` for an ended attempt.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), AttemptError> {
        self.ensure_in_progress()?;
        self.last_healthcheck_at = now;
        Ok(())
    }

    /// Charges the whole seconds elapsed since the last healthcheck and
    /// returns how many were charged.
    ///
    /// The baseline moves forward by exactly the charged amount, so sub-second
    /// remainders carry into the next healthcheck and no interval is charged
    /// twice. A clock reading earlier than the baseline charges nothing.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyEnded` for an ended attempt.
    pub fn decay(&mut self, now: DateTime<Utc>) -> Result<i64, AttemptError> {
        self.ensure_in_progress()?;
        let elapsed = (now - self.last_healthcheck_at).num_seconds().max(0);
        self.remaining_seconds = self.remaining_seconds.saturating_sub(elapsed);
        self.last_healthcheck_at += Duration::seconds(elapsed);
        Ok(elapsed)
    }

    /// Finalizes the attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyEnded` if the attempt was already finalized.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), AttemptError> {
        self.ensure_in_progress()?;
        self.is_ended = true;
        self.ended_at = Some(now.max(self.started_at));
        Ok(())
    }

    /// Moves the progression cursor one slot forward and returns its new value.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyEnded` for an ended attempt.
    pub fn advance_cursor(&mut self) -> Result<u32, AttemptError> {
        self.ensure_in_progress()?;
        self.next_question_index = self.next_question_index.saturating_add(1);
        Ok(self.next_question_index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
