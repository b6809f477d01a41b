//! Structured diagnostics handed back to the plugin host.

use crate::handle::Operation;
use serde::Serialize;
use vra_core::Error;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The operation failed
    Error,
    /// The operation succeeded with something worth reporting
    Warning,
}

/// One diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Short, one-line summary
    pub summary: String,
    /// Full explanation
    pub detail: String,
    /// Machine-readable error code, when derived from an [`Error`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl Diagnostic {
    /// Build an error diagnostic.
    #[must_use]
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            code: None,
        }
    }

    /// Build a warning diagnostic.
    #[must_use]
    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            code: None,
        }
    }

    /// Describe why `operation` on `identity_key` failed.
    #[must_use]
    pub fn from_error(operation: Operation, identity_key: &str, error: &Error) -> Self {
        let summary = format!("Unable to {} {identity_key}", operation.verb());
        let detail = match error {
            Error::RetriesExhausted { last_error, .. } => format!(
                "{error}. The server still reports: {last_error}. Another object probably \
                 references this one; remove that reference or delete the referencing \
                 object, then retry."
            ),
            Error::Unauthorized(_) => format!(
                "{error}. Check that the configured credentials are valid and have access \
                 to this object."
            ),
            _ => error.to_string(),
        };

        Self {
            code: Some(error.error_code()),
            ..Self::error(summary, detail)
        }
    }
}

/// Ordered list of diagnostics for one host call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Collect the diagnostics for a lifecycle result, passing the value through.
    pub fn from_result<T>(
        operation: Operation,
        identity_key: &str,
        result: vra_core::Result<T>,
    ) -> (Option<T>, Self) {
        match result {
            Ok(value) => (Some(value), Self::new()),
            Err(error) => {
                let mut diagnostics = Self::new();
                diagnostics.push(Diagnostic::from_error(operation, identity_key, &error));
                (None, diagnostics)
            }
        }
    }

    /// Append an entry.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Returns true if any entry is an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(entries: Vec<Diagnostic>) -> Self {
        Self(entries)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn exhausted_delete_explains_the_cycle() {
        let error = Error::RetriesExhausted {
            attempts: 180,
            elapsed: Duration::from_secs(900),
            last_error: Box::new(Error::Conflict(
                "Action is referenced by workflow 'Deploy'".into(),
            )),
        };
        let diagnostic = Diagnostic::from_error(Operation::Delete, "action-42", &error);

        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.summary, "Unable to delete action-42");
        assert!(diagnostic.detail.contains("180 attempts"));
        assert!(diagnostic
            .detail
            .contains("Action is referenced by workflow 'Deploy'"));
        assert_eq!(diagnostic.code, Some("RETRIES_EXHAUSTED"));
    }

    #[test]
    fn from_result_passes_values_through() {
        let (value, diagnostics) =
            Diagnostics::from_result(Operation::Read, "cfg-1", Ok::<_, Error>(5));
        assert_eq!(value, Some(5));
        assert!(diagnostics.is_empty());
        assert!(!diagnostics.has_error());

        let (value, diagnostics) = Diagnostics::from_result::<()>(
            Operation::Update,
            "cfg-1",
            Err(Error::Validation {
                status: 400,
                message: "bad name".into(),
            }),
        );
        assert!(value.is_none());
        assert!(diagnostics.has_error());
        assert_eq!(diagnostics.len(), 1);
        let entry = diagnostics.iter().next().unwrap();
        assert_eq!(entry.summary, "Unable to update cfg-1");
        assert!(entry.detail.contains("bad name"));
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::warning("Object vanished", "removed from state"));
        assert!(!diagnostics.has_error());

        diagnostics.extend([Diagnostic::error("boom", "details")]);
        assert!(diagnostics.has_error());
        assert_eq!(diagnostics.into_iter().count(), 2);
    }

    #[test]
    fn serializes_as_a_list() {
        let diagnostics = Diagnostics::from(vec![Diagnostic::from_error(
            Operation::Create,
            "wf",
            &Error::Unauthorized("forbidden".into()),
        )]);
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json[0]["severity"], "error");
        assert_eq!(json[0]["code"], "UNAUTHORIZED");
    }
}
