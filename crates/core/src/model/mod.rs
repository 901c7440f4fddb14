mod answer;
mod assessment;
mod attempt;
mod ids;
mod question;
mod user;

pub use ids::{AnswerId, AssessmentId, AttemptId, OptionId, ParseIdError, QuestionId, UserId};

pub use answer::AnsweredQuestion;
pub use assessment::{
    Assessment, AssessmentError, AssessmentSettings, QuestionOrdering, RandomDraw,
};
pub use attempt::{AssessmentAttempt, AttemptDraft, AttemptError, AttemptState};
pub use question::{OptionView, Question, QuestionError, QuestionOption, QuestionView};
pub use user::{User, UserError};
