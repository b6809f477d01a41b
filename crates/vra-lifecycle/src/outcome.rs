//! Classification of a single request attempt.
//!
//! Every request the lifecycle client sends is turned into exactly one
//! [`Outcome`], which the caller consumes immediately.

use crate::handle::Operation;
use reqwest::StatusCode;
use vra_core::client::RawResponse;
use vra_core::{Error, Result};

/// Body fragments the server uses when an object is still referenced elsewhere.
pub const REFERENCE_CONFLICT_MARKERS: &[&str] = &[
    "referenced by",
    "is in use",
    "is used by",
    "still referenced",
    "has references",
];

const MAX_MESSAGE_LEN: usize = 1024;

/// Result of one request attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Status was in the allow list
    Success(RawResponse),
    /// 404 on a read or delete
    NotFound,
    /// 409, 429, a 5xx, or a reference-conflict body. Retryable.
    Conflict(String),
    /// 401 or 403. Never retried.
    AuthFailure(String),
    /// Any other status. Never retried.
    ValidationFailure {
        /// Status returned
        status: StatusCode,
        /// Error text extracted from the body
        message: String,
    },
    /// No response was received. Retryable.
    Transport(Error),
    /// The request could not be sent at all (bad path, token source failure).
    Failed(Error),
}

impl Outcome {
    /// Classify the result of one request.
    ///
    /// `allowed` lists the statuses that count as success for this call site.
    #[must_use]
    pub fn classify(
        operation: Operation,
        allowed: &[StatusCode],
        attempt: Result<RawResponse>,
    ) -> Self {
        let response = match attempt {
            Ok(response) => response,
            Err(err) if err.is_transport() => return Self::Transport(err),
            Err(Error::Unauthorized(message)) => return Self::AuthFailure(message),
            Err(err) => return Self::Failed(err),
        };

        let status = response.status;
        if status == StatusCode::NOT_FOUND && operation.tolerates_missing() {
            return Self::NotFound;
        }

        if allowed.contains(&status) {
            return Self::Success(response);
        }

        let message = error_message(&response);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Self::AuthFailure(message);
        }

        if status == StatusCode::CONFLICT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
            || signals_reference_conflict(&message)
        {
            return Self::Conflict(message);
        }

        Self::ValidationFailure { status, message }
    }

    /// Returns true for outcomes the delete loop retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Transport(_))
    }

    /// Split into the response (`Some` on success, `None` when the object is
    /// gone) or the error describing the failure.
    ///
    /// # Errors
    ///
    /// Returns the [`Error`] variant matching every non-success outcome.
    pub fn into_result(self) -> Result<Option<RawResponse>> {
        match self {
            Self::Success(response) => Ok(Some(response)),
            Self::NotFound => Ok(None),
            Self::Conflict(message) => Err(Error::Conflict(message)),
            Self::AuthFailure(message) => Err(Error::Unauthorized(message)),
            Self::ValidationFailure { status, message } => Err(Error::Validation {
                status: status.as_u16(),
                message,
            }),
            Self::Transport(err) | Self::Failed(err) => Err(err),
        }
    }
}

/// Returns true if `body` says the object is still referenced by another one.
#[must_use]
pub fn signals_reference_conflict(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    REFERENCE_CONFLICT_MARKERS
        .iter()
        .any(|marker| body.contains(marker))
}

// Error bodies are usually `{"status": .., "message": ".."}`; fall back to raw text.
fn error_message(response: &RawResponse) -> String {
    let parsed = serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|value| {
            ["message", "errorMessage", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        });

    let message = parsed.unwrap_or_else(|| response.text().trim().to_string());
    if message.is_empty() {
        return response
            .status
            .canonical_reason()
            .unwrap_or("empty response body")
            .to_string();
    }

    if message.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        return format!("{}... [truncated, {} bytes total]", &message[..end], message.len());
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> Result<RawResponse> {
        Ok(RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            version_token: None,
            body: body.as_bytes().to_vec(),
        })
    }

    fn classify(operation: Operation, status: u16, body: &str) -> Outcome {
        Outcome::classify(
            operation,
            operation.default_allowed_codes(),
            response(status, body),
        )
    }

    #[test]
    fn transport_errors_are_retryable() {
        for err in [
            Error::Transport("connection refused".into()),
            Error::Timeout("deadline".into()),
        ] {
            let outcome = Outcome::classify(Operation::Delete, &[], Err(err.clone()));
            assert_eq!(outcome, Outcome::Transport(err));
            assert!(outcome.is_retryable());
        }
    }

    #[test]
    fn token_failures_are_auth_failures() {
        let outcome = Outcome::classify(
            Operation::Read,
            &[],
            Err(Error::Unauthorized("login rejected".into())),
        );
        assert_eq!(outcome, Outcome::AuthFailure("login rejected".into()));
    }

    #[test]
    fn local_errors_are_fatal() {
        let outcome = Outcome::classify(
            Operation::Create,
            &[],
            Err(Error::InvalidEndpoint("bad path".into())),
        );
        assert!(matches!(outcome, Outcome::Failed(Error::InvalidEndpoint(_))));
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn not_found_only_for_read_and_delete() {
        assert_eq!(classify(Operation::Read, 404, ""), Outcome::NotFound);
        assert_eq!(classify(Operation::Delete, 404, ""), Outcome::NotFound);

        let outcome = classify(Operation::Update, 404, r#"{"message": "no such action"}"#);
        assert_eq!(
            outcome,
            Outcome::ValidationFailure {
                status: StatusCode::NOT_FOUND,
                message: "no such action".into()
            }
        );
        assert!(matches!(
            classify(Operation::Create, 404, ""),
            Outcome::ValidationFailure { .. }
        ));
    }

    #[test]
    fn allow_list_is_per_call_site() {
        assert!(matches!(classify(Operation::Create, 201, "{}"), Outcome::Success(_)));
        assert!(matches!(
            classify(Operation::Read, 201, "{}"),
            Outcome::ValidationFailure { .. }
        ));

        let custom = Outcome::classify(
            Operation::Read,
            &[StatusCode::OK, StatusCode::PARTIAL_CONTENT],
            response(206, "{}"),
        );
        assert!(matches!(custom, Outcome::Success(_)));
    }

    #[test]
    fn auth_statuses_are_fatal() {
        assert_eq!(
            classify(Operation::Delete, 401, "token expired"),
            Outcome::AuthFailure("token expired".into())
        );
        let outcome = classify(Operation::Delete, 403, "");
        assert_eq!(outcome, Outcome::AuthFailure("Forbidden".into()));
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn conflicts_and_server_errors_are_retryable() {
        for status in [409, 429, 500, 502, 503] {
            let outcome = classify(Operation::Delete, status, "busy");
            assert_eq!(outcome, Outcome::Conflict("busy".into()), "status {status}");
            assert!(outcome.is_retryable());
        }
    }

    #[test]
    fn reference_conflict_body_is_retryable() {
        let body = r#"{"status": 400, "message": "Action 'com.acme/notify' is referenced by workflow 'Deploy'"}"#;
        let outcome = classify(Operation::Delete, 400, body);
        assert_eq!(
            outcome,
            Outcome::Conflict("Action 'com.acme/notify' is referenced by workflow 'Deploy'".into())
        );
    }

    #[test]
    fn other_statuses_are_validation_failures() {
        let outcome = classify(Operation::Create, 400, "name must not be empty");
        assert_eq!(
            outcome.clone().into_result().unwrap_err(),
            Error::Validation {
                status: 400,
                message: "name must not be empty".into()
            }
        );
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn into_result_maps_every_variant() {
        assert!(classify(Operation::Read, 200, "{}")
            .into_result()
            .unwrap()
            .is_some());
        assert!(Outcome::NotFound.into_result().unwrap().is_none());
        assert_eq!(
            Outcome::Conflict("x".into()).into_result().unwrap_err(),
            Error::Conflict("x".into())
        );
        assert_eq!(
            Outcome::AuthFailure("x".into()).into_result().unwrap_err(),
            Error::Unauthorized("x".into())
        );
        assert_eq!(
            Outcome::Transport(Error::Timeout("t".into()))
                .into_result()
                .unwrap_err(),
            Error::Timeout("t".into())
        );
    }

    #[test]
    fn marker_matching_is_case_insensitive() {
        assert!(signals_reference_conflict("Element IS IN USE by 3 workflows"));
        assert!(!signals_reference_conflict("invalid script syntax"));
    }

    #[test]
    fn long_messages_are_truncated() {
        let body = "x".repeat(MAX_MESSAGE_LEN + 10);
        match classify(Operation::Create, 400, &body) {
            Outcome::ValidationFailure { message, .. } => {
                assert!(message.starts_with(&"x".repeat(MAX_MESSAGE_LEN)));
                assert!(message.ends_with(&format!("[truncated, {} bytes total]", body.len())));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
