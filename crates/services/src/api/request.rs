use serde::{Deserialize, Deserializer};
use url::Url;

use assessment_core::model::{AssessmentId, OptionId};

/// Position of the assessment id among the `/`-separated pieces of a page
/// path such as `/app/assessments/take/<id>/...` (the leading empty piece
/// counts as the first).
const REFERER_ID_SEGMENT: usize = 4;

/// Body of a start call. A missing body means `end_existing_attempt = false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct StartRequest {
    #[serde(default, deserialize_with = "flag")]
    pub end_existing_attempt: bool,
}

/// Body of an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SubmitAnswerRequest {
    #[serde(rename = "OptionId")]
    pub option_id: OptionId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

/// Accepts `true`/`false`, integers (non-zero is true) and `null`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        None => false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefererError {
    Missing,
    Unparseable,
}

impl RefererError {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Missing => "Referer header not found",
            Self::Unparseable => "Unable to parse Referer header",
        }
    }
}

/// Extracts the assessment id from a page URL sent as `Referer`.
///
/// Relative references are resolved against a dummy origin so only the path
/// matters.
///
/// # Errors
///
/// Returns `RefererError::Missing` for an absent or blank header and
/// `RefererError::Unparseable` if the URL, the segment, or the id is invalid.
pub fn assessment_id_from_referer(referer: Option<&str>) -> Result<AssessmentId, RefererError> {
    let referer = referer
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(RefererError::Missing)?;

    let url = match Url::parse(referer) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost/")
            .and_then(|base| base.join(referer))
            .map_err(|_| RefererError::Unparseable)?,
        Err(_) => return Err(RefererError::Unparseable),
    };

    url.path()
        .split('/')
        .nth(REFERER_ID_SEGMENT)
        .and_then(|segment| segment.parse().ok())
        .ok_or(RefererError::Unparseable)
}
