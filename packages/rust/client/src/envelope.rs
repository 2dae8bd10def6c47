//! Compile response envelope and its interpretation.
//!
//! The service answers with one of:
//! - `{ "error": true, "reason": "..." }` (optionally with a `result` payload)
//! - `{ "success": bool, "result": "<markup>", "files": [{ "name", "content" }] }`

use relaybuild_shared::{Fragment, RelayError, Result};
use serde::Deserialize;
use tracing::warn;

/// Reason reported when a fault envelope omits one.
const UNSPECIFIED_FAULT: &str = "unspecified server fault";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The service ran and produced artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSuccess {
    /// Rendered diagnostic report (markup fragment).
    pub diagnostic_output: String,
    /// Compiled artifacts in injection order.
    pub files: Vec<Fragment>,
}

/// The service ran and rejected the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub diagnostic_output: String,
}

/// The service could not run the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFault {
    pub reason: String,
    /// Diagnostic payload sent alongside the fault, display only.
    pub diagnostic_output: Option<String>,
}

/// An interpreted response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResponse {
    Success(CompileSuccess),
    Failure(CompileFailure),
    Fault(ServerFault),
}

impl CompileResponse {
    /// Diagnostic markup carried by the envelope, if any.
    pub fn diagnostic_output(&self) -> Option<&str> {
        match self {
            Self::Success(s) => Some(&s.diagnostic_output),
            Self::Failure(f) => Some(&f.diagnostic_output),
            Self::Fault(f) => f.diagnostic_output.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    error: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<String>,
    // Explicit `null` is accepted for every field.
    #[serde(default)]
    files: Option<Vec<Fragment>>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Interpret a raw response body.
///
/// Anything that is not a recognizable envelope is a [`RelayError::Transport`];
/// the parse detail is logged, not returned.
pub fn decode_envelope(body: &str) -> Result<CompileResponse> {
    let raw: RawEnvelope = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, bytes = body.len(), "compile response is not a valid envelope");
        RelayError::Transport
    })?;

    if raw.error == Some(true) {
        return Ok(CompileResponse::Fault(ServerFault {
            reason: raw
                .reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| UNSPECIFIED_FAULT.to_string()),
            diagnostic_output: raw.result,
        }));
    }

    match raw.success {
        Some(true) => Ok(CompileResponse::Success(CompileSuccess {
            diagnostic_output: raw.result.unwrap_or_default(),
            files: raw.files.unwrap_or_default(),
        })),
        Some(false) => Ok(CompileResponse::Failure(CompileFailure {
            diagnostic_output: raw.result.unwrap_or_default(),
        })),
        None => {
            warn!("compile response carries neither `error` nor `success`");
            Err(RelayError::Transport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_success_with_ordered_files() {
        let body = r#"{"success":true,"result":"<p>ok</p>","files":[
            {"name":"b.js","content":"b()"},{"name":"a.js","content":"a()"}]}"#;
        match decode_envelope(body).expect("decode") {
            CompileResponse::Success(s) => {
                assert_eq!(s.diagnostic_output, "<p>ok</p>");
                let names: Vec<_> = s.files.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["b.js", "a.js"]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn decodes_failure() {
        let body = r#"{"success":false,"result":"<pre>error</pre>","files":[]}"#;
        assert_eq!(
            decode_envelope(body).expect("decode"),
            CompileResponse::Failure(CompileFailure {
                diagnostic_output: "<pre>error</pre>".into()
            })
        );
    }

    #[test]
    fn null_fields_are_treated_as_absent() {
        let body = r#"{"success":false,"result":"<pre>error</pre>","files":null}"#;
        assert_eq!(
            decode_envelope(body).expect("decode"),
            CompileResponse::Failure(CompileFailure {
                diagnostic_output: "<pre>error</pre>".into()
            })
        );

        let body = r#"{"error":null,"success":true,"result":null,"files":null}"#;
        assert_eq!(
            decode_envelope(body).expect("decode"),
            CompileResponse::Success(CompileSuccess {
                diagnostic_output: String::new(),
                files: Vec::new(),
            })
        );
    }

    #[test]
    fn decodes_fault_with_and_without_payload() {
        let fault = decode_envelope(r#"{"error":true,"reason":"overloaded"}"#).expect("decode");
        assert_eq!(
            fault,
            CompileResponse::Fault(ServerFault {
                reason: "overloaded".into(),
                diagnostic_output: None,
            })
        );

        let fault =
            decode_envelope(r#"{"error":true,"reason":"crashed","result":"<pre>trace</pre>"}"#)
                .expect("decode");
        assert_eq!(fault.diagnostic_output(), Some("<pre>trace</pre>"));
    }

    #[test]
    fn fault_without_reason_gets_placeholder() {
        match decode_envelope(r#"{"error":true}"#).expect("decode") {
            CompileResponse::Fault(f) => assert_eq!(f.reason, UNSPECIFIED_FAULT),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn error_false_falls_through_to_success_flag() {
        let body = r#"{"error":false,"success":false,"result":"bad"}"#;
        assert!(matches!(
            decode_envelope(body).expect("decode"),
            CompileResponse::Failure(_)
        ));
    }

    #[test]
    fn malformed_bodies_are_transport_errors() {
        for body in ["", "<html>502</html>", "{}", r#"{"success":true,"files":[{"content":"x"}]}"#] {
            assert!(
                matches!(decode_envelope(body), Err(RelayError::Transport)),
                "body {body:?} should be rejected"
            );
        }
    }
}
