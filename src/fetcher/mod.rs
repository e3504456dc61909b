pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use transport::{
    HttpTransport, OutboundRequest, RawResponse, Transport, TransportError, TOKEN_HEADER,
};

pub const DEFAULT_ENDPOINT: &str = "https://shhapi.vercel.app/api/result";
pub const GENERIC_REMOTE_ERROR: &str = "Failed to fetch result";
pub const MISSING_ROLL_NUMBER: &str = "Missing roll number";
pub const NO_HTML_RETURNED: &str = "No HTML returned from server";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    InvalidInput,
    NetworkError,
    RemoteError,
    EmptyPayload,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input",
            Self::NetworkError => "network error",
            Self::RemoteError => "remote error",
            Self::EmptyPayload => "empty payload",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LookupFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl LookupFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupResult {
    Success { html: String },
    Failure(LookupFailure),
}

impl LookupResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(LookupFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A validated lookup. Construction trims the roll number and refuses empty
/// input, so holding one means a request may be issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupRequest {
    pub roll_number: String,
    pub auth_token: String,
    pub generation: u64,
}

impl LookupRequest {
    pub fn new(roll_number: &str, auth_token: &str, generation: u64) -> Result<Self, LookupFailure> {
        let roll_number = roll_number.trim();
        if roll_number.is_empty() {
            return Err(LookupFailure::new(
                FailureKind::InvalidInput,
                MISSING_ROLL_NUMBER,
            ));
        }
        Ok(Self {
            roll_number: roll_number.to_string(),
            auth_token: auth_token.to_string(),
            generation,
        })
    }
}

#[derive(Serialize)]
struct LookupBody<'a> {
    #[serde(rename = "rollNo")]
    roll_no: &'a str,
}

#[derive(Deserialize)]
struct SuccessBody {
    result: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct ResultFetcher<T> {
    transport: T,
    endpoint: String,
}

impl<T: Transport> ResultFetcher<T> {
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validates the roll number and performs one lookup. Empty input fails
    /// before any I/O is attempted.
    pub async fn fetch(&self, roll_number: &str, token: &str) -> LookupResult {
        match LookupRequest::new(roll_number, token, 0) {
            Ok(request) => self.execute(&request).await,
            Err(failure) => LookupResult::Failure(failure),
        }
    }

    pub async fn execute(&self, request: &LookupRequest) -> LookupResult {
        let body = match serde_json::to_string(&LookupBody {
            roll_no: &request.roll_number,
        }) {
            Ok(body) => body,
            Err(e) => return LookupResult::failure(FailureKind::InvalidInput, e.to_string()),
        };
        let outbound = OutboundRequest {
            endpoint: self.endpoint.clone(),
            token: request.auth_token.clone(),
            body,
        };
        match self.transport.send(outbound).await {
            Ok(raw) => classify_response(&raw),
            Err(e) => {
                warn!(generation = request.generation, error = %e, "lookup transport failure");
                LookupResult::failure(FailureKind::NetworkError, e.to_string())
            }
        }
    }
}

/// Maps a provider response onto the lookup taxonomy.
pub fn classify_response(raw: &RawResponse) -> LookupResult {
    if !raw.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&raw.body)
            .ok()
            .and_then(|b| b.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_REMOTE_ERROR.to_string());
        debug!(status = raw.status, %message, "provider rejected lookup");
        return LookupResult::failure(FailureKind::RemoteError, message);
    }

    match serde_json::from_str::<SuccessBody>(&raw.body) {
        Ok(SuccessBody { result: Some(html) }) if !html.trim().is_empty() => {
            LookupResult::Success { html }
        }
        Ok(_) => LookupResult::failure(FailureKind::EmptyPayload, NO_HTML_RETURNED),
        Err(e) => LookupResult::failure(
            FailureKind::EmptyPayload,
            format!("{NO_HTML_RETURNED}: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[tokio::test]
    async fn non_empty_roll_issues_exactly_one_request() {
        let transport = MockTransport::ok_html("<p>ok</p>");
        let fetcher = ResultFetcher::new(transport.clone(), "http://provider.test/api/result");

        let result = fetcher.fetch("  2300541539001 ", "tok").await;

        assert!(result.is_success());
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].token, "tok");
        assert_eq!(calls[0].endpoint, "http://provider.test/api/result");
        let body: serde_json::Value = serde_json::from_str(&calls[0].body).unwrap();
        assert_eq!(body["rollNo"], "2300541539001");
    }

    #[tokio::test]
    async fn blank_roll_never_reaches_transport() {
        let transport = MockTransport::ok_html("<p>ok</p>");
        let fetcher = ResultFetcher::new(transport.clone(), "http://provider.test/");

        for roll in ["", "   ", "\t\n"] {
            let result = fetcher.fetch(roll, "tok").await;
            match result {
                LookupResult::Failure(f) => assert_eq!(f.kind, FailureKind::InvalidInput),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_network_failure() {
        let transport = MockTransport::failing();
        let fetcher = ResultFetcher::new(transport, "http://provider.test/");
        match fetcher.fetch("1", "tok").await {
            LookupResult::Failure(f) => assert_eq!(f.kind, FailureKind::NetworkError),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn remote_error_prefers_provider_message() {
        let raw = RawResponse {
            status: 500,
            body: r#"{"message":"roll not found"}"#.to_string(),
        };
        assert_eq!(
            classify_response(&raw),
            LookupResult::failure(FailureKind::RemoteError, "roll not found")
        );
    }

    #[test]
    fn remote_error_falls_back_to_generic_message() {
        let raw = RawResponse {
            status: 502,
            body: "<html>Bad gateway</html>".to_string(),
        };
        assert_eq!(
            classify_response(&raw),
            LookupResult::failure(FailureKind::RemoteError, GENERIC_REMOTE_ERROR)
        );
    }

    #[test]
    fn empty_or_missing_result_is_empty_payload() {
        for body in [r#"{"result":""}"#, r#"{}"#, r#"{"result":null}"#, "not json"] {
            let raw = RawResponse {
                status: 200,
                body: body.to_string(),
            };
            match classify_response(&raw) {
                LookupResult::Failure(f) => assert_eq!(f.kind, FailureKind::EmptyPayload),
                other => panic!("unexpected {other:?} for {body}"),
            }
        }
    }
}
