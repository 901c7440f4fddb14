#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod assessment_service;
pub mod assignment;
pub mod attempt_service;
pub mod error;
pub mod progression_service;
pub mod question_bank;
pub mod user_service;

pub use assessment_core::Clock;

pub use api::{ApiResponse, AssessmentApi, Envelope};
pub use app_services::{AppServices, ServiceOptions};
pub use assessment_service::{AssessmentDetails, AssessmentService};
pub use assignment::QuestionAssigner;
pub use attempt_service::{AttemptService, HealthcheckOutcome, StartOutcome};
pub use error::{
    AppServicesError, AssessmentServiceError, AssignmentError, AttemptServiceError, ErrorKind,
    ProgressionError, QuestionBankError, UserServiceError,
};
pub use progression_service::{AnswerPolicy, ProgressionService, SubmittedAnswer};
pub use question_bank::QuestionBankService;
pub use user_service::UserService;
