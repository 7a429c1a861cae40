//! Restriction types and evaluation.

use super::body_matcher::body_matches;
use super::field_matcher::{fields_match, FieldSource};
use crate::request::{Body, InterceptedRequest};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Static restriction on headers, search params and body.
///
/// Without `exact`, every declared entry must be present in the request and
/// undeclared entries are ignored. With `exact`, each declared field must
/// equal the observed field entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticRestriction {
    pub headers: Option<Vec<(String, String)>>,
    pub search_params: Option<Vec<(String, String)>>,
    pub body: Option<Body>,
    pub exact: bool,
}

impl StaticRestriction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn search_param(mut self, name: &str, value: &str) -> Self {
        self.search_params
            .get_or_insert_with(Vec::new)
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Check this restriction against a request.
    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        if let Some(headers) = &self.headers {
            if !fields_match(FieldSource::Headers, headers, request, self.exact) {
                return false;
            }
        }
        if let Some(search_params) = &self.search_params {
            if !fields_match(FieldSource::SearchParams, search_params, request, self.exact) {
                return false;
            }
        }
        if let Some(body) = &self.body {
            if !body_matches(body, &request.body, self.exact) {
                return false;
            }
        }
        true
    }
}

type PredicateFn =
    dyn Fn(InterceptedRequest) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync;

/// A predicate a request must satisfy for a handler to match it.
#[derive(Clone)]
pub enum Restriction {
    Static(StaticRestriction),
    Computed(Arc<PredicateFn>),
}

impl Restriction {
    /// Wrap an async predicate over the normalized request.
    pub fn computed<F, Fut>(predicate: F) -> Self
    where
        F: Fn(InterceptedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Restriction::Computed(Arc::new(move |request| Box::pin(predicate(request))))
    }

    /// Wrap a synchronous predicate.
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&InterceptedRequest) -> bool + Send + Sync + 'static,
    {
        Self::computed(move |request| {
            let matched = predicate(&request);
            async move { Ok(matched) }
        })
    }

    pub async fn evaluate(&self, request: &InterceptedRequest) -> anyhow::Result<bool> {
        match self {
            Restriction::Static(restriction) => Ok(restriction.matches(request)),
            Restriction::Computed(predicate) => predicate(request.clone()).await,
        }
    }
}

impl From<StaticRestriction> for Restriction {
    fn from(restriction: StaticRestriction) -> Self {
        Restriction::Static(restriction)
    }
}

impl fmt::Debug for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Static(restriction) => {
                f.debug_tuple("Static").field(restriction).finish()
            }
            Restriction::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// A computed restriction failed while deciding.
#[derive(Debug, thiserror::Error)]
#[error("Restriction #{index} failed: {source}")]
pub struct RestrictionError {
    pub index: usize,
    #[source]
    pub source: anyhow::Error,
}

/// Evaluate restrictions in order; all must pass.
///
/// Short-circuits on the first failing restriction. An error from a computed
/// restriction is returned to the caller, which treats it as a non-match.
pub async fn evaluate_restrictions(
    restrictions: &[Restriction],
    request: &InterceptedRequest,
) -> Result<bool, RestrictionError> {
    for (index, restriction) in restrictions.iter().enumerate() {
        let matched = restriction
            .evaluate(request)
            .await
            .map_err(|source| RestrictionError { index, source })?;
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpMethod;
    use serde_json::json;
    use std::time::Duration;

    fn post_users(body: serde_json::Value) -> InterceptedRequest {
        InterceptedRequest::new(HttpMethod::Post, "http://localhost/users?role=admin")
            .unwrap()
            .with_header("authorization", "Bearer token")
            .unwrap()
            .with_body(Body::json(body))
    }

    #[tokio::test]
    async fn test_empty_restrictions_match_everything() {
        let request = post_users(json!({}));
        assert!(evaluate_restrictions(&[], &request).await.unwrap());
    }

    #[tokio::test]
    async fn test_restrictions_combine_with_and() {
        let request = post_users(json!({"message": "ok"}));
        let by_header: Restriction = StaticRestriction::new()
            .header("Authorization", "Bearer token")
            .into();
        let by_param: Restriction = StaticRestriction::new()
            .search_param("role", "admin")
            .into();
        let failing: Restriction = StaticRestriction::new()
            .search_param("role", "guest")
            .into();

        assert!(
            evaluate_restrictions(&[by_header.clone(), by_param.clone()], &request)
                .await
                .unwrap()
        );
        assert!(
            !evaluate_restrictions(&[by_header, by_param, failing], &request)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_exact_body_restriction() {
        let exact: Restriction = StaticRestriction::new()
            .body(Body::json(json!({"message": "ok"})))
            .exact(true)
            .into();
        let partial: Restriction = StaticRestriction::new()
            .body(Body::json(json!({"message": "ok"})))
            .into();

        let plain = post_users(json!({"message": "ok"}));
        let extended = post_users(json!({"message": "ok", "extra": 1}));

        assert!(exact.evaluate(&plain).await.unwrap());
        assert!(!exact.evaluate(&extended).await.unwrap());
        assert!(partial.evaluate(&plain).await.unwrap());
        assert!(partial.evaluate(&extended).await.unwrap());
    }

    #[tokio::test]
    async fn test_async_computed_restriction() {
        let restriction = Restriction::computed(|request| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(request.search_param("role") == Some("admin"))
        });
        assert!(restriction.evaluate(&post_users(json!({}))).await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_computed_restriction_reports_index() {
        let passing = Restriction::from_fn(|_| true);
        let failing = Restriction::computed(|_| async { Err(anyhow::anyhow!("boom")) });

        let error = evaluate_restrictions(&[passing, failing], &post_users(json!({})))
            .await
            .unwrap_err();
        assert_eq!(error.index, 1);
        assert!(error.to_string().contains("boom"));
    }
}
