//! One roll-number session: fetch, sanitize, render, bind.
//!
//! Every request carries a generation number. Only a response whose
//! generation matches the latest issued request may touch the surface; older
//! responses are dropped as stale.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::binder::{BindOptions, BindReport, Binder};
use crate::fetcher::{
    FailureKind, LookupFailure, LookupRequest, LookupResult, ResultFetcher, Transport,
};
use crate::notify::ToastQueue;
use crate::print::{self, PrintError, PrintOutcome, PrintSink};
use crate::render::scripts::{self, ReplayReport, ScriptHost};
use crate::render::RenderSurface;
use crate::sanitize::{self, ScriptPolicy};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub bind: BindOptions,
    pub script_policy: ScriptPolicy,
    pub trusted_scripts: bool,
}

impl SessionOptions {
    /// Replay only takes effect when trusted execution is enabled.
    pub fn effective_policy(&self) -> ScriptPolicy {
        match (self.script_policy, self.trusted_scripts) {
            (ScriptPolicy::Replay, true) => ScriptPolicy::Replay,
            _ => ScriptPolicy::Strip,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    MissingInput,
    Idle,
    Loading { generation: u64 },
    Ready,
    Failed(LookupFailure),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a lookup is already in progress")]
    Busy,

    #[error("no roll number to retry")]
    NothingToRetry,

    #[error(transparent)]
    Invalid(#[from] LookupFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Rendered {
        serial: u64,
        bind: Option<BindReport>,
        scripts: Option<ReplayReport>,
    },
    Failed(LookupFailure),
    Stale {
        generation: u64,
        latest: u64,
    },
}

pub struct LookupSession<T> {
    fetcher: ResultFetcher<T>,
    token: String,
    toasts: ToastQueue,
    surface: RenderSurface,
    options: SessionOptions,
    state: SessionState,
    roll_number: Option<String>,
    latest_generation: u64,
    script_host: Option<Box<dyn ScriptHost>>,
}

impl<T: Transport> LookupSession<T> {
    pub fn new(
        fetcher: ResultFetcher<T>,
        token: impl Into<String>,
        toasts: ToastQueue,
        options: SessionOptions,
    ) -> Self {
        match (options.script_policy, options.trusted_scripts) {
            (ScriptPolicy::Replay, false) => {
                warn!("replay script policy requested without trusted_scripts; stripping scripts")
            }
            (ScriptPolicy::Replay, true) => {
                warn!("trusted script replay enabled: provider scripts run with host privileges")
            }
            _ => {}
        }
        Self {
            fetcher,
            token: token.into(),
            toasts,
            surface: RenderSurface::with_binder(Binder::new(options.bind)),
            options,
            state: SessionState::Idle,
            roll_number: None,
            latest_generation: 0,
            script_host: None,
        }
    }

    pub fn with_script_host(mut self, host: Box<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Loading { .. })
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn roll_number(&self) -> Option<&str> {
        self.roll_number.as_deref()
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_generation
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    /// Starts a lookup for a (possibly new) roll number. Any response still
    /// outstanding for an earlier generation becomes stale.
    pub fn begin(&mut self, roll_number: &str) -> Result<LookupRequest, SessionError> {
        let next = self.latest_generation + 1;
        let request = match LookupRequest::new(roll_number, &self.token, next) {
            Ok(request) => request,
            Err(failure) => {
                if !self.is_loading() {
                    self.state = SessionState::MissingInput;
                }
                self.toasts.error(failure.message.clone());
                return Err(failure.into());
            }
        };
        if let SessionState::Loading { generation } = self.state {
            debug!(superseded = generation, next, "roll number changed during lookup");
        }
        self.latest_generation = next;
        self.roll_number = Some(request.roll_number.clone());
        self.state = SessionState::Loading { generation: next };
        info!(generation = next, roll = %request.roll_number, "lookup started");
        Ok(request)
    }

    /// Re-issues the lookup for the current roll number. Refused while a
    /// lookup is in flight.
    pub fn retry(&mut self) -> Result<LookupRequest, SessionError> {
        if self.is_loading() {
            return Err(SessionError::Busy);
        }
        let roll = self.roll_number.clone().ok_or(SessionError::NothingToRetry)?;
        self.begin(&roll)
    }

    /// Applies a completed lookup. Responses from a superseded generation are
    /// dropped without touching state, the surface or the toast queue.
    pub fn apply(&mut self, generation: u64, result: LookupResult) -> ApplyOutcome {
        if generation != self.latest_generation {
            debug!(generation, latest = self.latest_generation, "discarding stale response");
            return ApplyOutcome::Stale {
                generation,
                latest: self.latest_generation,
            };
        }

        match result {
            LookupResult::Success { html } => {
                let sanitized = sanitize::sanitize(&html, self.options.effective_policy());
                let serial = self.surface.render(&sanitized).serial();
                let bind = self.surface.complete_load();
                let scripts = self.replay_scripts();
                self.state = SessionState::Ready;
                ApplyOutcome::Rendered {
                    serial,
                    bind,
                    scripts,
                }
            }
            LookupResult::Failure(failure) => {
                warn!(kind = failure.kind.label(), message = %failure.message, "lookup failed");
                self.toasts.error(failure_toast(&failure));
                self.state = SessionState::Failed(failure.clone());
                ApplyOutcome::Failed(failure)
            }
        }
    }

    fn replay_scripts(&mut self) -> Option<ReplayReport> {
        let pending = self.surface.take_pending_scripts();
        if pending.is_empty() || self.options.effective_policy() != ScriptPolicy::Replay {
            return None;
        }
        let host = match self.script_host.as_mut() {
            Some(host) => host,
            None => {
                warn!(count = pending.len(), "no script host attached; scripts dropped");
                return None;
            }
        };
        Some(scripts::replay(host.as_mut(), &pending))
    }

    pub async fn lookup(&mut self, roll_number: &str) -> Result<ApplyOutcome, SessionError> {
        let request = self.begin(roll_number)?;
        Ok(self.complete(request).await)
    }

    pub async fn retry_lookup(&mut self) -> Result<ApplyOutcome, SessionError> {
        let request = self.retry()?;
        Ok(self.complete(request).await)
    }

    async fn complete(&mut self, request: LookupRequest) -> ApplyOutcome {
        let result = self.fetcher.execute(&request).await;
        self.apply(request.generation, result)
    }

    pub fn click_section(&mut self, key: &str) -> bool {
        self.surface.click_section(key).is_some()
    }

    pub fn print(&self, sink: &mut dyn PrintSink) -> Result<PrintOutcome, PrintError> {
        print::print(&self.surface, self.is_loading(), sink, &self.toasts)
    }
}

fn failure_toast(failure: &LookupFailure) -> String {
    match failure.kind {
        FailureKind::InvalidInput | FailureKind::EmptyPayload => failure.message.clone(),
        FailureKind::NetworkError | FailureKind::RemoteError => {
            format!("Failed to load result: {}", failure.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::MockTransport;
    use crate::notify::ToastLevel;

    fn session(transport: MockTransport) -> LookupSession<MockTransport> {
        LookupSession::new(
            ResultFetcher::new(transport, "http://provider.test/api/result"),
            "tok",
            ToastQueue::new(),
            SessionOptions::default(),
        )
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut s = session(MockTransport::ok_html("<p>x</p>"));
        let first = s.begin("111").unwrap();
        let second = s.begin("222").unwrap();
        assert!(second.generation > first.generation);

        let outcome = s.apply(
            first.generation,
            LookupResult::Success {
                html: "<p>for 111</p>".into(),
            },
        );
        assert_eq!(
            outcome,
            ApplyOutcome::Stale {
                generation: first.generation,
                latest: second.generation
            }
        );
        assert!(!s.surface().has_content());
        assert!(s.is_loading());

        let outcome = s.apply(
            second.generation,
            LookupResult::Success {
                html: "<p>for 222</p>".into(),
            },
        );
        assert!(matches!(outcome, ApplyOutcome::Rendered { .. }));
        assert!(s
            .surface()
            .document()
            .unwrap()
            .to_html()
            .contains("for 222"));
        assert_eq!(s.state(), &SessionState::Ready);
    }

    #[test]
    fn retry_is_refused_while_loading() {
        let mut s = session(MockTransport::ok_html("<p>x</p>"));
        s.begin("111").unwrap();
        assert_eq!(s.retry(), Err(SessionError::Busy));
    }

    #[test]
    fn blank_roll_sets_missing_input() {
        let mut s = session(MockTransport::ok_html("<p>x</p>"));
        let err = s.begin("   ").unwrap_err();
        assert!(matches!(err, SessionError::Invalid(ref f) if f.kind == FailureKind::InvalidInput));
        assert_eq!(s.state(), &SessionState::MissingInput);
        assert_eq!(s.latest_generation(), 0);
        assert_eq!(s.toasts().drain()[0].level, ToastLevel::Error);
    }

    #[test]
    fn blank_roll_during_lookup_keeps_it_in_flight() {
        let mut s = session(MockTransport::ok_html("<p>x</p>"));
        s.begin("1").unwrap();
        assert!(s.begin("  ").is_err());
        assert_eq!(s.state(), &SessionState::Loading { generation: 1 });
        assert_eq!(s.retry(), Err(SessionError::Busy));
        assert_eq!(s.latest_generation(), 1);
        assert_eq!(s.toasts().drain()[0].level, ToastLevel::Error);
    }

    #[tokio::test]
    async fn retry_after_failure_fetches_again() {
        let transport = MockTransport::respond(503, r#"{"message":"busy"}"#);
        transport.push(200, r#"{"result":"<p>ok</p>"}"#);
        let mut s = session(transport.clone());

        let first = s.lookup("42").await.unwrap();
        assert!(matches!(first, ApplyOutcome::Failed(_)));
        let second = s.retry_lookup().await.unwrap();
        assert!(matches!(second, ApplyOutcome::Rendered { .. }));
        assert_eq!(transport.calls().len(), 2);
    }

    #[test]
    fn replay_without_trust_falls_back_to_strip() {
        let options = SessionOptions {
            script_policy: ScriptPolicy::Replay,
            trusted_scripts: false,
            ..SessionOptions::default()
        };
        assert_eq!(options.effective_policy(), ScriptPolicy::Strip);
    }

    #[test]
    fn trusted_replay_runs_scripts_through_host() {
        let options = SessionOptions {
            script_policy: ScriptPolicy::Replay,
            trusted_scripts: true,
            ..SessionOptions::default()
        };
        let mut s = LookupSession::new(
            ResultFetcher::new(MockTransport::default(), "http://provider.test/"),
            "tok",
            ToastQueue::new(),
            options,
        )
        .with_script_host(Box::new(scripts::CollectingScriptHost::default()));
        let request = s.begin("1").unwrap();
        let outcome = s.apply(
            request.generation,
            LookupResult::Success {
                html: "<body><p>x</p><script>a()</script><script>b()</script></body>".into(),
            },
        );
        match outcome {
            ApplyOutcome::Rendered { scripts, .. } => {
                assert_eq!(scripts.unwrap().executed, 2)
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.surface().document().unwrap().to_html().contains("a()"));
    }
}
