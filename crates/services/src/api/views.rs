use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use assessment_core::model::{AssessmentAttempt, AssessmentId, AttemptId, User, UserId};

use crate::assessment_service::AssessmentDetails;

/// Wire shape of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub user_uuid: Uuid,
    pub slug: String,
    pub title: String,
    pub status: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            user_uuid: user.uuid(),
            slug: user.slug().to_owned(),
            title: user.title().to_owned(),
            status: user.status(),
            first_name: user.first_name().to_owned(),
            last_name: user.last_name().to_owned(),
            email: user.email().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptView {
    pub id: AttemptId,
    pub assessment: AssessmentId,
    pub is_assessment_end: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub next_question_index: u32,
    pub last_healthcheck: DateTime<Utc>,
}

impl From<&AssessmentAttempt> for AttemptView {
    fn from(attempt: &AssessmentAttempt) -> Self {
        Self {
            id: attempt.id(),
            assessment: attempt.assessment_id(),
            is_assessment_end: attempt.is_ended(),
            start_date: attempt.started_at(),
            end_date: attempt.ended_at(),
            remaining_seconds: attempt.remaining_seconds(),
            next_question_index: attempt.next_question_index(),
            last_healthcheck: attempt.last_healthcheck_at(),
        }
    }
}

/// Wire shape of an assessment with its attempt history. Question slots are
/// not exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentView {
    pub assessment_uuid: AssessmentId,
    pub is_not_random_question: bool,
    pub assessment_info: Option<String>,
    pub test_attempts_count: u32,
    pub duration_minutes: u32,
    pub question_count: u32,
    pub test_type: Option<i32>,
    pub user: UserId,
    pub attempts: Vec<AttemptView>,
}

impl From<&AssessmentDetails> for AssessmentView {
    fn from(details: &AssessmentDetails) -> Self {
        let assessment = &details.assessment;
        let settings = assessment.settings();
        Self {
            assessment_uuid: assessment.id(),
            is_not_random_question: settings.ordering().is_sequential(),
            assessment_info: settings.info().map(str::to_owned),
            test_attempts_count: assessment.attempts_started(),
            duration_minutes: settings.duration_minutes(),
            question_count: settings.question_count(),
            test_type: settings.test_type(),
            user: assessment.owner(),
            attempts: details.attempts.iter().map(AttemptView::from).collect(),
        }
    }
}
