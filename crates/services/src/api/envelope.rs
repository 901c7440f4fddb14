use serde::Serialize;
use serde_json::Value;

pub const STATUS_OK: i32 = 1;
pub const STATUS_FAILED: i32 = 0;
pub const SUCCESS_MESSAGE: &str = "Success";

/// Standard response body: `{"Status": .., "Message": .., "Data": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    #[serde(rename = "Status")]
    pub status: i32,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Data")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            status: STATUS_OK,
            message: SUCCESS_MESSAGE.to_owned(),
            data: Some(data),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILED,
            message: message.into(),
            data: None,
        }
    }
}

/// Transport-neutral response: an HTTP status code plus the JSON envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub http_status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok<T: Serialize>(data: T) -> Self {
        Self::with_status(200, &Envelope::success(data))
    }

    pub fn created<T: Serialize>(data: T) -> Self {
        Self::with_status(201, &Envelope::success(data))
    }

    pub fn error(http_status: u16, message: impl Into<String>) -> Self {
        Self::with_status(http_status, &Envelope::<()>::failure(message))
    }

    fn with_status<T: Serialize>(http_status: u16, envelope: &Envelope<T>) -> Self {
        match serde_json::to_value(envelope) {
            Ok(body) => Self { http_status, body },
            Err(err) => Self {
                http_status: 500,
                body: serde_json::json!({
                    "Status": STATUS_FAILED,
                    "Message": err.to_string(),
                    "Data": Value::Null,
                }),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }

    /// The `Data` member of the envelope.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.body["Data"]
    }

    /// The `Message` member of the envelope.
    #[must_use]
    pub fn message(&self) -> &str {
        self.body["Message"].as_str().unwrap_or_default()
    }
}
