//! Header and search param matching.
//!
//! Partial matching requires every declared pair to be present in the
//! request; undeclared keys are ignored. For multi-valued fields a declared
//! value matches when it is one of the observed values. Exact matching
//! requires the observed pairs to equal the declared pairs, ignoring order.

use crate::request::InterceptedRequest;

/// Which request field a restriction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Headers,
    SearchParams,
}

impl FieldSource {
    /// Header names are case-insensitive; search param names are not.
    fn normalize_key(&self, key: &str) -> String {
        match self {
            FieldSource::Headers => key.to_ascii_lowercase(),
            FieldSource::SearchParams => key.to_string(),
        }
    }

    fn observed(&self, request: &InterceptedRequest) -> Vec<(String, String)> {
        match self {
            FieldSource::Headers => request.header_pairs(),
            FieldSource::SearchParams => request.search_params.clone(),
        }
    }
}

/// Check declared pairs against the request field.
pub fn fields_match(
    source: FieldSource,
    declared: &[(String, String)],
    request: &InterceptedRequest,
    exact: bool,
) -> bool {
    let observed = source.observed(request);
    let declared: Vec<(String, String)> = declared
        .iter()
        .map(|(k, v)| (source.normalize_key(k), v.clone()))
        .collect();

    if exact {
        let mut expected = declared;
        let mut actual = observed;
        expected.sort();
        actual.sort();
        return expected == actual;
    }

    declared.iter().all(|(name, value)| {
        observed
            .iter()
            .any(|(observed_name, observed_value)| observed_name == name && observed_value == value)
    })
}
