//! Declared responses and the producers that create them.

use crate::request::{Body, InterceptedRequest};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Response declared by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    /// Header name/value pairs, in declaration order
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn merge_headers<H, K, V>(mut self, headers: H) -> Self
    where
        H: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name.as_ref(), value.as_ref());
        }
        self
    }

    /// Set the body. A `content-type` header is added unless one was declared.
    pub fn body(mut self, body: Body) -> Self {
        if let Some(content_type) = body.content_type() {
            if self.header_value("content-type").is_none() {
                self.headers
                    .push(("content-type".to_string(), content_type.to_string()));
            }
        }
        self.body = body;
        self
    }

    pub fn json(self, value: serde_json::Value) -> Self {
        self.body(Body::Json(value))
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.body(Body::Text(value.into()))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type ProducerFn =
    dyn Fn(InterceptedRequest) -> BoxFuture<'static, anyhow::Result<MockResponse>> + Send + Sync;

/// Produces the response of a handler: either a static declaration or a
/// function of the matched request.
#[derive(Clone)]
pub enum ResponseProducer {
    Static(MockResponse),
    Computed(Arc<ProducerFn>),
}

impl ResponseProducer {
    /// Wrap an async function of the matched request.
    pub fn computed<F, Fut>(producer: F) -> Self
    where
        F: Fn(InterceptedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<MockResponse>> + Send + 'static,
    {
        ResponseProducer::Computed(Arc::new(move |request| Box::pin(producer(request))))
    }

    /// Wrap a synchronous function of the matched request.
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn(&InterceptedRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self::computed(move |request| {
            let response = producer(&request);
            async move { Ok(response) }
        })
    }

    pub async fn produce(&self, request: &InterceptedRequest) -> anyhow::Result<MockResponse> {
        match self {
            ResponseProducer::Static(response) => Ok(response.clone()),
            ResponseProducer::Computed(producer) => producer(request.clone()).await,
        }
    }
}

impl From<MockResponse> for ResponseProducer {
    fn from(response: MockResponse) -> Self {
        ResponseProducer::Static(response)
    }
}

impl fmt::Debug for ResponseProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseProducer::Static(response) => f.debug_tuple("Static").field(response).finish(),
            ResponseProducer::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}
