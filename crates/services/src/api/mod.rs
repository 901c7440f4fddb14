//! Transport-neutral request handlers.
//!
//! Each handler takes the raw pieces of a request (path parameters as text,
//! an optional JSON body, headers) and returns an [`ApiResponse`] holding the
//! HTTP status and the `{Status, Message, Data}` envelope. Routing and the
//! wire listener stay outside this crate.

mod envelope;
mod request;
mod views;

use serde::de::DeserializeOwned;

use assessment_core::model::{AssessmentId, AssessmentSettings, UserId};

use crate::app_services::AppServices;
use crate::error::{AttemptServiceError, ErrorKind, ProgressionError, UserServiceError};

pub use envelope::{ApiResponse, Envelope, STATUS_FAILED, STATUS_OK, SUCCESS_MESSAGE};
pub use request::{RefererError, StartRequest, SubmitAnswerRequest, assessment_id_from_referer};
pub use views::{AssessmentView, AttemptView, UserView};

const ASSESSMENT_MISSING: &str = "Assessment does not exist";
const USER_MISSING: &str = "specified user ID does not exist";

/// Status for an error kind, with the code used when the target is missing.
fn status_for(kind: ErrorKind, not_found: u16) -> u16 {
    match kind {
        ErrorKind::NotFound => not_found,
        ErrorKind::BadRequest => 400,
        ErrorKind::Conflict => 409,
        ErrorKind::Internal => 500,
    }
}

fn parse_body<T: DeserializeOwned + Default>(body: Option<&str>) -> Result<T, ApiResponse> {
    match body.map(str::trim).filter(|b| !b.is_empty()) {
        None => Ok(T::default()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| ApiResponse::error(400, e.to_string())),
    }
}

/// One handler per endpoint of the assessment API.
#[derive(Clone)]
pub struct AssessmentApi {
    services: AppServices,
}

impl AssessmentApi {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }

    #[must_use]
    pub fn services(&self) -> &AppServices {
        &self.services
    }

    /// `POST /users`
    pub async fn create_user(&self) -> ApiResponse {
        match self.services.users().create_user().await {
            Ok(user) => ApiResponse::created(UserView::from(&user)),
            Err(err) => user_error(&err, 500),
        }
    }

    /// `GET /users/{id}`
    pub async fn get_user(&self, user_id: &str) -> ApiResponse {
        let Ok(id) = user_id.parse::<UserId>() else {
            return ApiResponse::error(404, format!("user {user_id} does not exist"));
        };
        match self.services.users().get_user(id).await {
            Ok(user) => ApiResponse::ok(UserView::from(&user)),
            Err(err) => user_error(&err, 404),
        }
    }

    /// `POST /users/{user_id}/assessments`, using the configured default settings.
    pub async fn create_assessment(&self, user_id: &str) -> ApiResponse {
        let settings = self.services.default_settings();
        self.create_assessment_with(user_id, settings).await
    }

    /// Same as [`create_assessment`](Self::create_assessment) with explicit settings.
    pub async fn create_assessment_with(
        &self,
        user_id: &str,
        settings: AssessmentSettings,
    ) -> ApiResponse {
        let Ok(id) = user_id.parse::<UserId>() else {
            return ApiResponse::error(400, USER_MISSING);
        };
        match self
            .services
            .assessments()
            .create_assessment(id, settings)
            .await
        {
            Ok(assessment) => ApiResponse::created(assessment.id()),
            Err(err) => ApiResponse::error(status_for(err.kind(), 400), err.to_string()),
        }
    }

    /// `GET /assessments/{id}`
    pub async fn get_assessment(&self, assessment_id: &str) -> ApiResponse {
        let Ok(id) = assessment_id.parse::<AssessmentId>() else {
            return ApiResponse::error(404, ASSESSMENT_MISSING);
        };
        match self.services.assessments().get_assessment(id).await {
            Ok(details) => ApiResponse::ok(AssessmentView::from(&details)),
            Err(err) => ApiResponse::error(status_for(err.kind(), 404), err.to_string()),
        }
    }

    /// `POST /assessments/{id}/start` with an optional `{end_existing_attempt}` body.
    pub async fn start(&self, assessment_id: &str, body: Option<&str>) -> ApiResponse {
        let request: StartRequest = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let Ok(id) = assessment_id.parse::<AssessmentId>() else {
            return ApiResponse::error(404, ASSESSMENT_MISSING);
        };
        match self
            .services
            .attempts()
            .start(id, request.end_existing_attempt)
            .await
        {
            Ok(_) => ApiResponse::ok(true),
            Err(err) => attempt_error(&err, 404),
        }
    }

    /// `GET /assessments/healthz`, identifying the assessment by `Referer`.
    pub async fn healthcheck(&self, referer: Option<&str>) -> ApiResponse {
        let id = match assessment_id_from_referer(referer) {
            Ok(id) => id,
            Err(err) => return ApiResponse::error(400, err.message()),
        };
        match self.services.attempts().healthcheck(id).await {
            Ok(_) => ApiResponse::ok("OK"),
            Err(err) => attempt_error(&err, 404),
        }
    }

    /// `GET /assessments/{id}/questions/{index}` with a 1-based index.
    pub async fn get_question(&self, assessment_id: &str, index: &str) -> ApiResponse {
        let (id, index) = match parse_question_path(assessment_id, index) {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        match self.services.progression().get_question(id, index).await {
            Ok(view) => ApiResponse::ok(view),
            Err(err) => progression_error(&err),
        }
    }

    /// `POST /assessments/{id}/questions/{index}/answers` with `{OptionId}`.
    pub async fn submit_answer(
        &self,
        assessment_id: &str,
        index: &str,
        body: Option<&str>,
    ) -> ApiResponse {
        let (id, index) = match parse_question_path(assessment_id, index) {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        let Some(raw) = body else {
            return ApiResponse::error(400, "request body with OptionId is required");
        };
        let request: SubmitAnswerRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(err) => return ApiResponse::error(400, err.to_string()),
        };
        match self
            .services
            .progression()
            .submit_answer(id, index, request.option_id)
            .await
        {
            Ok(_) => ApiResponse::ok(true),
            Err(err) => progression_error(&err),
        }
    }

    /// `POST /assessments/{id}/end`
    pub async fn end(&self, assessment_id: &str) -> ApiResponse {
        let Ok(id) = assessment_id.parse::<AssessmentId>() else {
            return ApiResponse::error(404, ASSESSMENT_MISSING);
        };
        match self.services.attempts().end(id).await {
            Ok(_) => ApiResponse::ok(true),
            Err(err @ AttemptServiceError::NoActiveAttempt(_)) => {
                ApiResponse::error(400, err.to_string())
            }
            Err(err) => attempt_error(&err, 404),
        }
    }
}

fn parse_question_path(
    assessment_id: &str,
    index: &str,
) -> Result<(AssessmentId, i64), ApiResponse> {
    let id = assessment_id
        .parse::<AssessmentId>()
        .map_err(|_| ApiResponse::error(400, ASSESSMENT_MISSING))?;
    let index = index
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiResponse::error(400, format!("invalid question index: {index}")))?;
    Ok((id, index))
}

fn user_error(err: &UserServiceError, not_found: u16) -> ApiResponse {
    ApiResponse::error(status_for(err.kind(), not_found), err.to_string())
}

fn attempt_error(err: &AttemptServiceError, not_found: u16) -> ApiResponse {
    ApiResponse::error(status_for(err.kind(), not_found), err.to_string())
}

/// Question and answer endpoints report a missing parent as a bad request.
fn progression_error(err: &ProgressionError) -> ApiResponse {
    ApiResponse::error(status_for(err.kind(), 400), err.to_string())
}
