use std::sync::Arc;

use assessment_core::model::{
    AssessmentAttempt, AssessmentId, AssessmentSettings, AttemptDraft, QuestionOrdering,
};
use assessment_core::time::fixed_now;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use services::{AppServices, AssessmentApi, Clock, ServiceOptions};
use storage::repository::{AttemptRepository, InMemoryRepository, Storage, StorageError};

fn api() -> AssessmentApi {
    AssessmentApi::new(AppServices::in_memory(
        Clock::fixed(fixed_now()),
        ServiceOptions::default(),
    ))
}

async fn user_id(api: &AssessmentApi) -> String {
    let created = api.create_user().await;
    assert_eq!(created.http_status, 201);
    created.data()["id"].to_string()
}

async fn sequential_assessment(api: &AssessmentApi) -> String {
    let user = user_id(api).await;
    let settings = AssessmentSettings::new(1, 3, QuestionOrdering::Sequential).unwrap();
    let created = api.create_assessment_with(&user, settings).await;
    assert_eq!(created.http_status, 201);
    created.data().as_str().unwrap().to_owned()
}

#[tokio::test]
async fn users_are_created_and_fetched() {
    let api = api();
    let created = api.create_user().await;
    assert_eq!(created.body["Status"], json!(1));
    assert_eq!(created.body["Message"], json!("Success"));
    assert_eq!(created.data()["title"], json!("Data Scientist"));
    assert_eq!(created.data()["slug"], json!("data-scientist-1"));

    assert_eq!(api.get_user("1").await.http_status, 200);

    let missing = api.get_user("77").await;
    assert_eq!(missing.http_status, 404);
    assert_eq!(missing.body["Status"], json!(0));
    assert_eq!(missing.data(), &Value::Null);
}

#[tokio::test]
async fn create_assessment_for_unknown_user_is_bad_request() {
    let api = api();
    let response = api.create_assessment("12").await;
    assert_eq!(response.http_status, 400);
    assert_eq!(response.message(), "specified user ID does not exist");
}

#[tokio::test]
async fn default_assessment_has_stock_settings() {
    let api = api();
    let user = user_id(&api).await;
    let id = api.create_assessment(&user).await;
    let fetched = api.get_assessment(id.data().as_str().unwrap()).await;

    assert_eq!(fetched.http_status, 200);
    assert_eq!(fetched.data()["duration_minutes"], json!(60));
    assert_eq!(fetched.data()["question_count"], json!(15));
    assert_eq!(fetched.data()["is_not_random_question"], json!(false));
    assert_eq!(fetched.data()["attempts"], json!([]));
}

#[tokio::test]
async fn full_flow_through_handlers() {
    let api = api();
    let id = sequential_assessment(&api).await;

    let start = api.start(&id, None).await;
    assert_eq!(start.http_status, 200);
    assert_eq!(start.data(), &json!(true));

    let referer = format!("http://localhost:3000/app/assessment/take/{id}");
    let ping = api.healthcheck(Some(&referer)).await;
    assert_eq!(ping.http_status, 200);
    assert_eq!(ping.data(), &json!("OK"));

    let question = api.get_question(&id, "1").await;
    assert_eq!(question.http_status, 200);
    assert_eq!(question.data()["question_text"], json!("question 0"));
    let options = question.data()["Options"].as_array().unwrap();
    assert_eq!(options.len(), 5);
    assert!(options[0].get("is_correct").is_none());
    let option_id = options[0]["id"].clone();

    let answer = api
        .submit_answer(&id, "1", Some(&json!({ "OptionId": option_id }).to_string()))
        .await;
    assert_eq!(answer.http_status, 200);

    let again = api
        .submit_answer(&id, "1", Some(&json!({ "OptionId": option_id }).to_string()))
        .await;
    assert_eq!(again.http_status, 409);

    assert_eq!(api.end(&id).await.http_status, 200);
    let second_end = api.end(&id).await;
    assert_eq!(second_end.http_status, 400);
    assert_eq!(second_end.message(), "no assessment attempt found");

    let fetched = api.get_assessment(&id).await;
    let attempts = fetched.data()["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["is_assessment_end"], json!(true));
    assert_eq!(attempts[0]["next_question_index"], json!(1));
    assert_eq!(fetched.data()["test_attempts_count"], json!(1));
}

#[tokio::test]
async fn start_with_end_flag_only_ends() {
    let api = api();
    let id = sequential_assessment(&api).await;
    api.start(&id, None).await;

    let ended = api.start(&id, Some(r#"{"end_existing_attempt": 1}"#)).await;
    assert_eq!(ended.http_status, 200);
    assert_eq!(api.end(&id).await.http_status, 400);

    assert_eq!(api.start(&id, Some("not json")).await.http_status, 400);
}

#[tokio::test]
async fn status_codes_for_missing_things() {
    let api = api();
    let unknown = AssessmentId::generate().to_string();

    assert_eq!(api.get_assessment(&unknown).await.http_status, 404);
    assert_eq!(api.start(&unknown, None).await.http_status, 404);
    assert_eq!(api.end(&unknown).await.http_status, 404);
    assert_eq!(api.get_question(&unknown, "1").await.http_status, 400);
    assert_eq!(
        api.submit_answer(&unknown, "1", Some(r#"{"OptionId": 1}"#))
            .await
            .http_status,
        400
    );

    let referer = format!("https://example.com/a/b/c/{unknown}");
    assert_eq!(api.healthcheck(Some(&referer)).await.http_status, 404);
    assert_eq!(api.healthcheck(None).await.http_status, 400);
    assert_eq!(
        api.healthcheck(Some("https://example.com/short"))
            .await
            .message(),
        "Unable to parse Referer header"
    );
}

#[tokio::test]
async fn question_index_out_of_range_is_bad_request() {
    let api = api();
    let id = sequential_assessment(&api).await;
    assert_eq!(api.get_question(&id, "0").await.http_status, 400);
    assert_eq!(api.get_question(&id, "4").await.http_status, 400);
    assert_eq!(api.get_question(&id, "3").await.http_status, 200);
}

#[tokio::test]
async fn submit_without_attempt_is_bad_request() {
    let api = api();
    let id = sequential_assessment(&api).await;
    let response = api.submit_answer(&id, "1", Some(r#"{"OptionId": 0}"#)).await;
    assert_eq!(response.http_status, 400);
    assert_eq!(api.submit_answer(&id, "1", None).await.http_status, 400);
}

/// Attempt store whose every call fails as if the database went away.
#[derive(Clone)]
struct UnavailableAttempts;

#[async_trait]
impl AttemptRepository for UnavailableAttempts {
    async fn begin_attempt(&self, _draft: AttemptDraft) -> Result<AssessmentAttempt, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn current_attempt(
        &self,
        _assessment_id: AssessmentId,
    ) -> Result<Option<AssessmentAttempt>, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn update_active_attempt(
        &self,
        _attempt: &AssessmentAttempt,
        _read_baseline: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn list_attempts(
        &self,
        _assessment_id: AssessmentId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }
}

#[tokio::test]
async fn storage_failures_surface_as_server_errors() {
    let repo = InMemoryRepository::new();
    let mut storage = Storage::from_repository(repo);
    let healthy = AssessmentApi::new(AppServices::from_storage(
        &storage,
        Clock::fixed(fixed_now()),
        ServiceOptions::default(),
    ));
    let id = sequential_assessment(&healthy).await;

    storage.attempts = Arc::new(UnavailableAttempts);
    let broken = AssessmentApi::new(AppServices::from_storage(
        &storage,
        Clock::fixed(fixed_now()),
        ServiceOptions::default(),
    ));

    let response = broken.start(&id, None).await;
    assert_eq!(response.http_status, 500);
    assert_eq!(response.body["Status"], json!(0));
}
