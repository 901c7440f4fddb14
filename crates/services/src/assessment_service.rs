use std::sync::Arc;

use assessment_core::model::{
    Assessment, AssessmentAttempt, AssessmentId, AssessmentSettings, UserId,
};
use storage::repository::{
    AssessmentRepository, AttemptRepository, QuestionRepository, StorageError, UserRepository,
};
use tracing::info;

use crate::assignment::QuestionAssigner;
use crate::error::AssessmentServiceError;
use crate::question_bank::QuestionBankService;

/// An assessment together with every attempt ever started on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentDetails {
    pub assessment: Assessment,
    pub attempts: Vec<AssessmentAttempt>,
}

/// Creates assessments and serves their history.
#[derive(Clone)]
pub struct AssessmentService {
    users: Arc<dyn UserRepository>,
    questions: Arc<dyn QuestionRepository>,
    assessments: Arc<dyn AssessmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
    bank: QuestionBankService,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        questions: Arc<dyn QuestionRepository>,
        assessments: Arc<dyn AssessmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        let bank = QuestionBankService::new(Arc::clone(&questions));
        Self {
            users,
            questions,
            assessments,
            attempts,
            bank,
        }
    }

    /// Create an assessment for `user_id` and fill its question slots.
    ///
    /// The default question bank is created first if the pool is empty.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServiceError::UserNotFound` for an unknown owner,
    /// `Assignment` if the pool cannot fill the slots, or storage errors.
    pub async fn create_assessment(
        &self,
        user_id: UserId,
        settings: AssessmentSettings,
    ) -> Result<Assessment, AssessmentServiceError> {
        if self.users.get_user(user_id).await?.is_none() {
            return Err(AssessmentServiceError::UserNotFound(user_id));
        }
        self.bank.ensure_default().await?;

        let pool = self.questions.list_question_ids().await?;
        let question_ids =
            QuestionAssigner::new(settings.ordering()).assign(&pool, settings.question_count())?;
        let assessment =
            Assessment::new(AssessmentId::generate(), user_id, settings, question_ids)?;

        match self.assessments.insert_assessment(&assessment).await {
            Ok(()) => {}
            Err(StorageError::NotFound) => {
                // Owner removed between the lookup and the insert.
                return Err(AssessmentServiceError::UserNotFound(user_id));
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            assessment_id = %assessment.id(),
            user_id = %user_id,
            question_count = assessment.settings().question_count(),
            "assessment created"
        );
        Ok(assessment)
    }

    /// # Errors
    ///
    /// Returns `AssessmentServiceError::AssessmentNotFound` for an unknown id.
    pub async fn get_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<AssessmentDetails, AssessmentServiceError> {
        let assessment = self
            .assessments
            .get_assessment(id)
            .await?
            .ok_or(AssessmentServiceError::AssessmentNotFound(id))?;
        let attempts = self.attempts.list_attempts(id).await?;
        Ok(AssessmentDetails {
            assessment,
            attempts,
        })
    }
}
