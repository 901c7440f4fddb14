use std::sync::Arc;

use assessment_core::model::{
    Assessment, AssessmentAttempt, AssessmentId, AttemptDraft, AttemptError,
};
use chrono::{DateTime, Utc};
use storage::repository::{AssessmentRepository, AttemptRepository, StorageError};
use tracing::{debug, info, warn};

use crate::Clock;
use crate::error::AttemptServiceError;

/// Bound on re-reads when concurrent writers keep moving an attempt's clock.
const MAX_TRANSITION_RETRIES: usize = 8;

/// What a call to [`AttemptService::start`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// No attempt was in progress; a fresh one was created.
    Started(AssessmentAttempt),
    /// The in-progress attempt was picked up again with its clock re-armed.
    Resumed(AssessmentAttempt),
    /// The in-progress attempt was finalized. A new one is only created by a
    /// subsequent `start`.
    EndedExisting(AssessmentAttempt),
}

impl StartOutcome {
    #[must_use]
    pub fn attempt(&self) -> &AssessmentAttempt {
        match self {
            Self::Started(a) | Self::Resumed(a) | Self::EndedExisting(a) => a,
        }
    }
}

/// Result of a healthcheck ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthcheckOutcome {
    Decayed {
        elapsed_seconds: i64,
        remaining_seconds: i64,
    },
    /// Nothing in progress (or it ended while the ping was in flight).
    Idle,
}

/// Owns the start/resume/end lifecycle of assessment attempts and their
/// lazily decayed countdown.
///
/// Every call reads state fresh from storage. The single-active-attempt
/// guarantee comes from `AttemptRepository::begin_attempt`, and writes go
/// through `update_active_attempt`, which refuses ended attempts and stale
/// decay baselines.
#[derive(Clone)]
pub struct AttemptService {
    clock: Clock,
    assessments: Arc<dyn AssessmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    #[must_use]
    pub fn new(
        clock: Clock,
        assessments: Arc<dyn AssessmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            assessments,
            attempts,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn load_assessment(&self, id: AssessmentId) -> Result<Assessment, AttemptServiceError> {
        self.assessments
            .get_assessment(id)
            .await?
            .ok_or(AttemptServiceError::AssessmentNotFound(id))
    }

    /// Start, resume, or end the assessment's attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::AssessmentNotFound` for an unknown assessment,
    /// `ConcurrentTransition` if the attempt changed state mid-call, or storage errors.
    pub async fn start(
        &self,
        id: AssessmentId,
        end_existing: bool,
    ) -> Result<StartOutcome, AttemptServiceError> {
        let assessment = self.load_assessment(id).await?;
        let now = self.clock.now();

        match self.attempts.current_attempt(id).await? {
            Some(existing) if end_existing => {
                let ended = self.finalize(existing, now).await?;
                info!(assessment_id = %id, attempt_id = %ended.id(), "ended attempt on restart request");
                Ok(StartOutcome::EndedExisting(ended))
            }
            Some(existing) => self.resume(existing, now).await.map(StartOutcome::Resumed),
            None => self.begin(&assessment, now).await,
        }
    }

    async fn begin(
        &self,
        assessment: &Assessment,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome, AttemptServiceError> {
        let id = assessment.id();
        match self
            .attempts
            .begin_attempt(AttemptDraft::for_assessment(assessment, now))
            .await
        {
            Ok(attempt) => {
                info!(
                    assessment_id = %id,
                    attempt_id = %attempt.id(),
                    remaining_seconds = attempt.remaining_seconds(),
                    "attempt started"
                );
                Ok(StartOutcome::Started(attempt))
            }
            Err(StorageError::Conflict) => {
                // Another start won the race; treat this call as a resume of its attempt.
                warn!(assessment_id = %id, "concurrent start detected, resuming winner");
                let winner = self
                    .attempts
                    .current_attempt(id)
                    .await?
                    .ok_or(AttemptServiceError::ConcurrentTransition(id))?;
                self.resume(winner, now).await.map(StartOutcome::Resumed)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn resume(
        &self,
        attempt: AssessmentAttempt,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, AttemptServiceError> {
        let id = attempt.assessment_id();
        let (attempt, ()) = self
            .apply(attempt, |a| a.resume(now))
            .await?
            .ok_or(AttemptServiceError::ConcurrentTransition(id))?;
        info!(
            assessment_id = %id,
            attempt_id = %attempt.id(),
            remaining_seconds = attempt.remaining_seconds(),
            "attempt resumed"
        );
        Ok(attempt)
    }

    async fn finalize(
        &self,
        attempt: AssessmentAttempt,
        now: DateTime<Utc>,
    ) -> Result<AssessmentAttempt, AttemptServiceError> {
        let id = attempt.assessment_id();
        self.apply(attempt, |a| a.end(now))
            .await?
            .map(|(ended, ())| ended)
            .ok_or(AttemptServiceError::NoActiveAttempt(id))
    }

    /// Applies `transition` to the attempt and writes it back, comparing the
    /// stored decay baseline with the one the transition started from.
    ///
    /// When another writer got there first the attempt is re-read and the
    /// transition recomputed. Returns `None` once the attempt is no longer in
    /// progress.
    async fn apply<T>(
        &self,
        mut attempt: AssessmentAttempt,
        transition: impl Fn(&mut AssessmentAttempt) -> Result<T, AttemptError> + Send,
    ) -> Result<Option<(AssessmentAttempt, T)>, AttemptServiceError>
    where
        T: Send,
    {
        let id = attempt.assessment_id();
        for _ in 0..MAX_TRANSITION_RETRIES {
            let read_baseline = attempt.last_healthcheck_at();
            let mut next = attempt.clone();
            let output = transition(&mut next)?;
            if self
                .attempts
                .update_active_attempt(&next, read_baseline)
                .await?
            {
                return Ok(Some((next, output)));
            }

            match self.attempts.current_attempt(id).await? {
                Some(fresh) if fresh.id() == next.id() => {
                    debug!(assessment_id = %id, attempt_id = %fresh.id(), "attempt clock moved, retrying");
                    attempt = fresh;
                }
                _ => return Ok(None),
            }
        }
        warn!(assessment_id = %id, "attempt kept changing under concurrent writers");
        Err(AttemptServiceError::ConcurrentTransition(id))
    }

    /// Charge the time elapsed since the last healthcheck to the active attempt.
    ///
    /// Succeeds without effect when nothing is in progress.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::AssessmentNotFound` for an unknown assessment,
    /// or storage errors.
    pub async fn healthcheck(
        &self,
        id: AssessmentId,
    ) -> Result<HealthcheckOutcome, AttemptServiceError> {
        self.load_assessment(id).await?;
        let Some(attempt) = self.attempts.current_attempt(id).await? else {
            return Ok(HealthcheckOutcome::Idle);
        };

        let now = self.clock.now();
        let attempt_id = attempt.id();
        let Some((attempt, elapsed_seconds)) = self.apply(attempt, |a| a.decay(now)).await? else {
            debug!(assessment_id = %id, %attempt_id, "healthcheck lost race with end");
            return Ok(HealthcheckOutcome::Idle);
        };

        debug!(
            assessment_id = %id,
            attempt_id = %attempt.id(),
            elapsed_seconds,
            remaining_seconds = attempt.remaining_seconds(),
            "attempt clock decayed"
        );
        Ok(HealthcheckOutcome::Decayed {
            elapsed_seconds,
            remaining_seconds: attempt.remaining_seconds(),
        })
    }

    /// Finalize the in-progress attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::AssessmentNotFound` for an unknown assessment,
    /// `NoActiveAttempt` when nothing is in progress, or storage errors.
    pub async fn end(&self, id: AssessmentId) -> Result<AssessmentAttempt, AttemptServiceError> {
        self.load_assessment(id).await?;
        let attempt = self
            .attempts
            .current_attempt(id)
            .await?
            .ok_or(AttemptServiceError::NoActiveAttempt(id))?;

        let ended = self.finalize(attempt, self.clock.now()).await?;
        info!(
            assessment_id = %id,
            attempt_id = %ended.id(),
            remaining_seconds = ended.remaining_seconds(),
            "attempt ended"
        );
        Ok(ended)
    }

    /// The single in-progress attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::AssessmentNotFound` for an unknown assessment,
    /// or storage errors.
    pub async fn current_attempt(
        &self,
        id: AssessmentId,
    ) -> Result<Option<AssessmentAttempt>, AttemptServiceError> {
        self.load_assessment(id).await?;
        Ok(self.attempts.current_attempt(id).await?)
    }
}
