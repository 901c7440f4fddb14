use std::sync::Arc;

use assessment_core::model::{AssessmentSettings, QuestionOrdering, RandomDraw};
use storage::repository::Storage;

use crate::Clock;
use crate::assessment_service::AssessmentService;
use crate::attempt_service::AttemptService;
use crate::error::AppServicesError;
use crate::progression_service::{AnswerPolicy, ProgressionService};
use crate::question_bank::QuestionBankService;
use crate::user_service::UserService;

/// Knobs that change service behavior without touching storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    pub answer_policy: AnswerPolicy,
    /// Default assessments take the lowest question ids instead of drawing.
    pub sequential: bool,
    /// Draw used for assessments created with random ordering.
    pub random_draw: RandomDraw,
}

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    options: ServiceOptions,
    users: Arc<UserService>,
    question_bank: Arc<QuestionBankService>,
    assessments: Arc<AssessmentService>,
    attempts: Arc<AttemptService>,
    progression: Arc<ProgressionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        options: ServiceOptions,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, options))
    }

    /// Build services over the in-memory backend.
    #[must_use]
    pub fn in_memory(clock: Clock, options: ServiceOptions) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, options)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, options: ServiceOptions) -> Self {
        let users = Arc::new(UserService::new(Arc::clone(&storage.users)));
        let question_bank = Arc::new(QuestionBankService::new(Arc::clone(&storage.questions)));
        let assessments = Arc::new(AssessmentService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.attempts),
        ));
        let attempts = Arc::new(AttemptService::new(
            clock,
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.attempts),
        ));
        let progression = Arc::new(
            ProgressionService::new(
                clock,
                Arc::clone(&storage.assessments),
                Arc::clone(&storage.questions),
                Arc::clone(&storage.attempts),
                Arc::clone(&storage.answers),
            )
            .with_policy(options.answer_policy),
        );

        Self {
            options,
            users,
            question_bank,
            assessments,
            attempts,
            progression,
        }
    }

    #[must_use]
    pub fn options(&self) -> ServiceOptions {
        self.options
    }

    /// Settings for assessments created without explicit configuration.
    #[must_use]
    pub fn default_settings(&self) -> AssessmentSettings {
        let defaults = AssessmentSettings::default();
        let ordering = if self.options.sequential {
            QuestionOrdering::Sequential
        } else {
            QuestionOrdering::Random {
                draw: self.options.random_draw,
            }
        };
        AssessmentSettings::new(defaults.duration_minutes(), defaults.question_count(), ordering)
            .unwrap_or(defaults)
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }

    #[must_use]
    pub fn question_bank(&self) -> Arc<QuestionBankService> {
        Arc::clone(&self.question_bank)
    }

    #[must_use]
    pub fn assessments(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessments)
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionService> {
        Arc::clone(&self.progression)
    }
}
