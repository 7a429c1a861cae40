//! Request handler state and declaration API.

use super::times::{TimesBudget, TimesViolation};
use crate::predicate::{PathPattern, Restriction};
use crate::request::{HttpMethod, InterceptedRequest};
use crate::response::{MockResponse, ResponseProducer};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// A request served by a handler, with the response it produced.
#[derive(Debug, Clone)]
pub struct InterceptedEntry {
    pub request: InterceptedRequest,
    pub response: MockResponse,
    pub intercepted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HandlerState {
    restrictions: Vec<Restriction>,
    producer: Option<ResponseProducer>,
    budget: TimesBudget,
    bypassed: bool,
    /// Served requests, kept only while request saving is enabled
    log: Vec<InterceptedEntry>,
    /// Served requests, counted even when not saved
    match_count: usize,
    /// Requests that reached this handler but failed its restrictions
    unmatched: Vec<InterceptedRequest>,
    unmatched_count: usize,
}

struct HandlerInner {
    id: Uuid,
    method: HttpMethod,
    path: PathPattern,
    state: Mutex<HandlerState>,
}

/// Snapshot of what dispatch needs from an eligible handler.
pub(crate) struct HandlerCandidate {
    pub restrictions: Vec<Restriction>,
    pub producer: ResponseProducer,
}

/// A declared rule: restrictions, a response producer and a call budget.
///
/// Cloning yields another handle to the same handler. Declaration methods
/// return `&Self` so they can be chained.
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<HandlerInner>,
}

impl RequestHandler {
    pub(crate) fn new(method: HttpMethod, path: PathPattern) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                id: Uuid::new_v4(),
                method,
                path,
                state: Mutex::new(HandlerState::default()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn method(&self) -> HttpMethod {
        self.inner.method
    }

    pub fn path(&self) -> &str {
        self.inner.path.as_str()
    }

    pub(crate) fn pattern(&self) -> &PathPattern {
        &self.inner.path
    }

    /// Add a restriction. All restrictions must pass for the handler to match.
    pub fn with(&self, restriction: impl Into<Restriction>) -> &Self {
        self.inner.state.lock().restrictions.push(restriction.into());
        self
    }

    /// Declare the response, replacing any previous declaration.
    ///
    /// A bypassed handler becomes eligible again.
    pub fn respond(&self, producer: impl Into<ResponseProducer>) -> &Self {
        let mut state = self.inner.state.lock();
        state.producer = Some(producer.into());
        state.bypassed = false;
        self
    }

    /// Expect exactly `count` matching requests.
    pub fn times(&self, count: usize) -> &Self {
        self.inner.state.lock().budget = TimesBudget::exact(count);
        self
    }

    /// Expect between `min` and `max` matching requests, inclusive.
    pub fn times_between(&self, min: usize, max: usize) -> &Self {
        self.inner.state.lock().budget = TimesBudget::range(min, max);
        self
    }

    /// Make the handler ineligible for matching, keeping its history.
    pub fn bypass(&self) -> &Self {
        self.inner.state.lock().bypassed = true;
        self
    }

    /// Reset restrictions, response, budget and history.
    pub fn clear(&self) -> &Self {
        *self.inner.state.lock() = HandlerState::default();
        self
    }

    pub fn is_bypassed(&self) -> bool {
        self.inner.state.lock().bypassed
    }

    pub fn has_response(&self) -> bool {
        self.inner.state.lock().producer.is_some()
    }

    pub fn budget(&self) -> TimesBudget {
        self.inner.state.lock().budget
    }

    pub fn restriction_count(&self) -> usize {
        self.inner.state.lock().restrictions.len()
    }

    /// Number of requests served since the last clear.
    pub fn match_count(&self) -> usize {
        self.inner.state.lock().match_count
    }

    /// Saved requests served by this handler, oldest first.
    pub fn requests(&self) -> Vec<InterceptedEntry> {
        self.inner.state.lock().log.clone()
    }

    /// Saved requests that reached this handler but failed its restrictions.
    pub fn unmatched_requests(&self) -> Vec<InterceptedRequest> {
        self.inner.state.lock().unmatched.clone()
    }

    /// Restrictions and producer if the handler can currently be selected.
    pub(crate) fn candidate(&self) -> Option<HandlerCandidate> {
        let state = self.inner.state.lock();
        if state.bypassed {
            return None;
        }
        let producer = state.producer.clone()?;
        Some(HandlerCandidate {
            restrictions: state.restrictions.clone(),
            producer,
        })
    }

    pub(crate) fn record_match(
        &self,
        request: InterceptedRequest,
        response: MockResponse,
        save: bool,
    ) {
        let mut state = self.inner.state.lock();
        state.match_count += 1;
        if save {
            state.log.push(InterceptedEntry {
                request,
                response,
                intercepted_at: Utc::now(),
            });
        }
    }

    pub(crate) fn record_mismatch(&self, request: InterceptedRequest, save: bool) {
        let mut state = self.inner.state.lock();
        state.unmatched_count += 1;
        if save {
            state.unmatched.push(request);
        }
    }

    /// Compare the served count with the declared budget.
    ///
    /// Bypassed handlers and handlers without a budget are not checked.
    pub(crate) fn check_times(&self) -> Option<TimesViolation> {
        let state = self.inner.state.lock();
        if state.bypassed || !state.budget.is_declared() || state.budget.allows(state.match_count)
        {
            return None;
        }
        Some(TimesViolation {
            method: self.inner.method,
            path: self.inner.path.as_str().to_string(),
            budget: state.budget,
            observed: state.match_count,
            unmatched: state.unmatched_count,
        })
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RequestHandler")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("path", &self.inner.path.as_str())
            .field("restrictions", &state.restrictions.len())
            .field("has_response", &state.producer.is_some())
            .field("budget", &state.budget)
            .field("bypassed", &state.bypassed)
            .field("match_count", &state.match_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::StaticRestriction;

    fn handler() -> RequestHandler {
        RequestHandler::new(HttpMethod::Get, PathPattern::parse("/users").unwrap())
    }

    fn request() -> InterceptedRequest {
        InterceptedRequest::new(HttpMethod::Get, "http://localhost/users").unwrap()
    }

    #[test]
    fn test_handler_without_response_is_not_a_candidate() {
        let handler = handler();
        assert!(handler.candidate().is_none());
        handler.respond(MockResponse::ok());
        assert!(handler.candidate().is_some());
    }

    #[test]
    fn test_chaining_applies_in_order() {
        let handler = handler();
        handler
            .with(StaticRestriction::new().header("x-a", "1"))
            .with(StaticRestriction::new().header("x-b", "2"))
            .respond(MockResponse::new(204))
            .times(2);

        assert_eq!(handler.restriction_count(), 2);
        assert_eq!(handler.budget(), TimesBudget::exact(2));
        assert!(handler.has_response());
    }

    #[test]
    fn test_bypass_keeps_history_and_respond_reenables() {
        let handler = handler();
        handler.respond(MockResponse::ok());
        handler.record_match(request(), MockResponse::ok(), true);
        handler.bypass();

        assert!(handler.candidate().is_none());
        assert_eq!(handler.requests().len(), 1);

        handler.respond(MockResponse::new(201));
        assert!(handler.candidate().is_some());
        assert_eq!(handler.requests().len(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let handler = handler();
        handler
            .with(StaticRestriction::new().search_param("page", "1"))
            .respond(MockResponse::ok())
            .times(1)
            .bypass();
        handler.record_match(request(), MockResponse::ok(), true);
        handler.record_mismatch(request(), true);

        handler.clear();

        assert_eq!(handler.restriction_count(), 0);
        assert!(!handler.has_response());
        assert!(!handler.is_bypassed());
        assert_eq!(handler.budget(), TimesBudget::Unconstrained);
        assert_eq!(handler.match_count(), 0);
        assert!(handler.requests().is_empty());
        assert!(handler.unmatched_requests().is_empty());
    }

    #[test]
    fn test_unsaved_matches_still_count() {
        let handler = handler();
        handler.respond(MockResponse::ok()).times(1);
        handler.record_match(request(), MockResponse::ok(), false);

        assert!(handler.requests().is_empty());
        assert_eq!(handler.match_count(), 1);
        assert!(handler.check_times().is_none());
    }

    #[test]
    fn test_check_times_reports_violation() {
        let handler = handler();
        handler.respond(MockResponse::ok()).times(1);
        handler.record_mismatch(request(), false);

        let violation = handler.check_times().unwrap();
        assert_eq!(violation.observed, 0);
        assert_eq!(violation.unmatched, 1);
        assert_eq!(violation.path, "/users");

        handler.bypass();
        assert!(handler.check_times().is_none());
    }
}
