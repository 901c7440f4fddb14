use std::sync::Arc;

use assessment_core::model::{
    AnswerId, AnsweredQuestion, Assessment, AssessmentError, AssessmentId, OptionId, QuestionId,
    QuestionView,
};
use storage::repository::{
    AnswerRepository, AssessmentRepository, AttemptRepository, QuestionRepository, StorageError,
};
use tracing::{debug, warn};

use crate::Clock;
use crate::error::ProgressionError;

/// How much of a submitted answer is checked before it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerPolicy {
    /// Record whatever the caller sends; only a second answer for the same
    /// slot is refused.
    #[default]
    Trusted,
    /// Additionally require the option to belong to the question and the
    /// slot to be the attempt's next unanswered one.
    Strict,
}

impl AnswerPolicy {
    /// Parses `trusted` or `strict`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trusted" => Some(Self::Trusted),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Outcome of a recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub answer_id: AnswerId,
    /// Cursor value after the answer was recorded.
    pub next_question_index: u32,
}

/// Serves questions by 1-based slot and records answers against the
/// in-progress attempt.
#[derive(Clone)]
pub struct ProgressionService {
    clock: Clock,
    policy: AnswerPolicy,
    assessments: Arc<dyn AssessmentRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    answers: Arc<dyn AnswerRepository>,
}

impl ProgressionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        assessments: Arc<dyn AssessmentRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
        answers: Arc<dyn AnswerRepository>,
    ) -> Self {
        Self {
            clock,
            policy: AnswerPolicy::default(),
            assessments,
            questions,
            attempts,
            answers,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AnswerPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> AnswerPolicy {
        self.policy
    }

    async fn load_assessment(&self, id: AssessmentId) -> Result<Assessment, ProgressionError> {
        self.assessments
            .get_assessment(id)
            .await?
            .ok_or(ProgressionError::AssessmentNotFound(id))
    }

    async fn load_question_view(&self, id: QuestionId) -> Result<QuestionView, ProgressionError> {
        self.questions
            .get_question(id)
            .await?
            .map(|q| q.view())
            .ok_or(ProgressionError::QuestionMissing(id))
    }

    /// Fetch the question in the given 1-based slot, without its answer key.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::AssessmentNotFound` for an unknown assessment,
    /// `Index` when `index` is outside `1..=question_count`, or storage errors.
    pub async fn get_question(
        &self,
        id: AssessmentId,
        index: i64,
    ) -> Result<QuestionView, ProgressionError> {
        let assessment = self.load_assessment(id).await?;
        let question_id = assessment.question_at(index)?;
        self.load_question_view(question_id).await
    }

    /// Record an answer for the given 1-based slot and advance the cursor.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::AssessmentNotFound`, `NoActiveAttempt`,
    /// `Index` for a slot outside the assessment, `AlreadyAnswered` for a
    /// repeated slot, `UnknownOption`/`OutOfOrder` under the strict policy,
    /// or storage errors.
    pub async fn submit_answer(
        &self,
        id: AssessmentId,
        index: i64,
        option_id: OptionId,
    ) -> Result<SubmittedAnswer, ProgressionError> {
        let assessment = self.load_assessment(id).await?;
        let attempt = self
            .attempts
            .current_attempt(id)
            .await?
            .ok_or(ProgressionError::NoActiveAttempt(id))?;
        let question_id = assessment.question_at(index)?;
        // question_at bounds the index to 1..=question_count, which fits a u32.
        let slot = u32::try_from(index).map_err(|_| {
            ProgressionError::Index(AssessmentError::IndexOutOfRange {
                index,
                count: assessment.settings().question_count(),
            })
        })?;

        if self.policy == AnswerPolicy::Strict {
            let question = self
                .questions
                .get_question(question_id)
                .await?
                .ok_or(ProgressionError::QuestionMissing(question_id))?;
            if !question.has_option(option_id) {
                return Err(ProgressionError::UnknownOption {
                    question_id,
                    option_id,
                });
            }
            let expected = attempt.next_question_index().saturating_add(1);
            if slot != expected {
                return Err(ProgressionError::OutOfOrder {
                    expected,
                    index: slot,
                });
            }
        }

        let answer = AnsweredQuestion::new(
            attempt.id(),
            question_id,
            slot,
            option_id,
            self.clock.now(),
        );
        match self.answers.record_answer(&answer).await {
            Ok((answer_id, updated)) => {
                debug!(
                    assessment_id = %id,
                    attempt_id = %updated.id(),
                    question_index = slot,
                    next_question_index = updated.next_question_index(),
                    "answer recorded"
                );
                Ok(SubmittedAnswer {
                    answer_id,
                    next_question_index: updated.next_question_index(),
                })
            }
            Err(StorageError::Conflict) => {
                // Either the slot was taken or the attempt ended underneath us.
                if self.attempts.current_attempt(id).await?.is_none() {
                    warn!(assessment_id = %id, "attempt ended while answer was in flight");
                    return Err(ProgressionError::NoActiveAttempt(id));
                }
                Err(ProgressionError::AlreadyAnswered(slot))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Answers recorded for the in-progress attempt, in submission order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::AssessmentNotFound`, `NoActiveAttempt`, or
    /// storage errors.
    pub async fn answers(&self, id: AssessmentId) -> Result<Vec<AnsweredQuestion>, ProgressionError> {
        self.load_assessment(id).await?;
        let attempt = self
            .attempts
            .current_attempt(id)
            .await?
            .ok_or(ProgressionError::NoActiveAttempt(id))?;
        Ok(self.answers.list_answers(attempt.id()).await?)
    }
}
