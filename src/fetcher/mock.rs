use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use super::transport::{OutboundRequest, RawResponse, Transport, TransportError};

#[derive(Clone, Debug)]
enum Reply {
    Response(RawResponse),
    Fail,
}

/// Records every request and answers from a scripted queue. The last reply
/// is repeated once the queue is drained.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockTransport {
    calls: Arc<Mutex<Vec<OutboundRequest>>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
}

impl MockTransport {
    pub(crate) fn respond(status: u16, body: &str) -> Self {
        let mock = Self::default();
        mock.push(status, body);
        mock
    }

    pub(crate) fn ok_html(html: &str) -> Self {
        Self::respond(200, &serde_json::json!({ "result": html }).to_string())
    }

    pub(crate) fn failing() -> Self {
        let mock = Self::default();
        mock.replies.lock().unwrap().push_back(Reply::Fail);
        mock
    }

    pub(crate) fn push(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Response(RawResponse {
                status,
                body: body.to_string(),
            }));
    }

    pub(crate) fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<RawResponse, TransportError>> {
        self.calls.lock().unwrap().push(request);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };
        Box::pin(async move {
            match reply {
                Some(Reply::Response(raw)) => Ok(raw),
                Some(Reply::Fail) => Err(TransportError::Connect("connection reset".to_string())),
                None => Err(TransportError::Other("no scripted reply".to_string())),
            }
        })
    }
}
