//! Handler registry: handlers grouped by endpoint key, in registration order.

use crate::handler::RequestHandler;
use crate::request::HttpMethod;
use std::cmp::Reverse;
use std::collections::HashMap;

struct RegisteredHandler {
    /// Registration sequence number, increasing across the whole registry
    sequence: u64,
    handler: RequestHandler,
}

/// Handlers sharing one (method, path pattern) key.
struct EndpointEntry {
    method: HttpMethod,
    handlers: Vec<RegisteredHandler>,
}

/// A handler whose endpoint matches a request, with extracted path params.
pub(crate) struct Candidate {
    pub handler: RequestHandler,
    pub path_params: HashMap<String, String>,
}

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    endpoints: Vec<EndpointEntry>,
    next_sequence: u64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: RequestHandler) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let registered = RegisteredHandler { sequence, handler };
        let existing = self.endpoints.iter_mut().find(|entry| {
            entry.method == registered.handler.method()
                && entry.handlers[0].handler.pattern() == registered.handler.pattern()
        });
        match existing {
            Some(entry) => entry.handlers.push(registered),
            None => self.endpoints.push(EndpointEntry {
                method: registered.handler.method(),
                handlers: vec![registered],
            }),
        }
    }

    /// Handlers whose endpoint matches the request, in selection order.
    ///
    /// Literal patterns come before templated ones (fewer parameters first);
    /// within the same specificity, the most recently registered handler
    /// comes first, across endpoint keys.
    pub fn candidates(&self, method: HttpMethod, path: &str) -> Vec<Candidate> {
        let mut matched: Vec<(usize, u64, Candidate)> = Vec::new();

        for entry in self.endpoints.iter().filter(|entry| entry.method == method) {
            let pattern = entry.handlers[0].handler.pattern();
            let Some(path_params) = pattern.matches(path) else {
                continue;
            };
            for registered in &entry.handlers {
                matched.push((
                    pattern.param_count(),
                    registered.sequence,
                    Candidate {
                        handler: registered.handler.clone(),
                        path_params: path_params.clone(),
                    },
                ));
            }
        }

        matched.sort_by_key(|(param_count, sequence, _)| (*param_count, Reverse(*sequence)));
        matched
            .into_iter()
            .map(|(_, _, candidate)| candidate)
            .collect()
    }

    /// All handlers in registration order.
    pub fn handlers(&self) -> Vec<RequestHandler> {
        let mut all: Vec<&RegisteredHandler> = self
            .endpoints
            .iter()
            .flat_map(|entry| entry.handlers.iter())
            .collect();
        all.sort_by_key(|registered| registered.sequence);
        all.into_iter()
            .map(|registered| registered.handler.clone())
            .collect()
    }

    /// Remove every handler, returning them in registration order.
    pub fn drain(&mut self) -> Vec<RequestHandler> {
        let handlers = self.handlers();
        self.endpoints.clear();
        handlers
    }

    pub fn len(&self) -> usize {
        self.endpoints.iter().map(|entry| entry.handlers.len()).sum()
    }
}
