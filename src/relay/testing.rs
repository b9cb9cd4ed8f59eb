//! In-process upstream for unit and router tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use futures_util::stream;

use crate::relay::transport::{TransportError, UpstreamRequest, UpstreamResponse, UpstreamTransport};

/// Canned upstream reply.
#[derive(Debug, Clone)]
pub(crate) struct MockReply {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

impl MockReply {
    pub(crate) fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

type Handler = dyn Fn(&UpstreamRequest) -> Result<MockReply, TransportError> + Send + Sync;

/// Transport that records every request and answers from a closure.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&UpstreamRequest) -> Result<MockReply, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with `reply`.
    pub(crate) fn fixed(reply: MockReply) -> Arc<Self> {
        Self::new(move |_| Ok(reply.clone()))
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamTransport for MockTransport {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = (self.handler)(&request)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &reply.headers {
            headers.append(HeaderName::from_static(name), HeaderValue::from_str(value).unwrap());
        }

        // Split the body so consumers see more than one chunk.
        let mid = reply.body.len() / 2;
        let chunks: Vec<Result<Bytes, TransportError>> = [&reply.body[..mid], &reply.body[mid..]]
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        Ok(UpstreamResponse {
            status: reply.status,
            headers,
            body: Box::pin(stream::iter(chunks)),
        })
    }
}
