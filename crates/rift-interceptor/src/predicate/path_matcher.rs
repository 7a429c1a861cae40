//! Path patterns for endpoint keys.
//!
//! A pattern is either a literal path (`/users/me`) or a templated path with
//! named segments (`/users/:id`). Templated patterns are compiled into a
//! single-route `matchit` router that extracts the parameters.

use matchit::Router;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("Invalid path pattern '{pattern}': {reason}")]
pub struct PathPatternError {
    pub pattern: String,
    pub reason: String,
}

#[derive(Clone)]
enum PatternKind {
    Literal,
    Templated {
        router: Arc<Router<()>>,
        param_count: usize,
    },
}

/// Compiled path pattern.
#[derive(Clone)]
pub struct PathPattern {
    /// Normalized pattern as declared (`/users/:id`)
    raw: String,
    kind: PatternKind,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PathPatternError> {
        let raw = normalize_path(pattern);
        let segments: Vec<&str> = raw.split('/').collect();
        let params: Vec<&str> = segments
            .iter()
            .filter(|s| is_param_segment(s))
            .map(|s| &s[1..])
            .collect();
        let param_count = params.len();
        if let Some((_, name)) = params
            .iter()
            .enumerate()
            .find(|&(i, name)| params[..i].contains(name))
        {
            return Err(PathPatternError {
                pattern: pattern.to_string(),
                reason: format!("parameter '{name}' is declared more than once"),
            });
        }

        if param_count == 0 {
            return Ok(Self {
                raw,
                kind: PatternKind::Literal,
            });
        }

        // matchit syntax: `{name}` for parameters, `{{`/`}}` for literal braces
        let route = segments
            .iter()
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if is_param_segment(segment) => format!("{{{name}}}"),
                _ => segment.replace('{', "{{").replace('}', "}}"),
            })
            .collect::<Vec<_>>()
            .join("/");

        let mut router = Router::new();
        router.insert(route, ()).map_err(|e| PathPatternError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw,
            kind: PatternKind::Templated {
                router: Arc::new(router),
                param_count,
            },
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, PatternKind::Literal)
    }

    /// Number of templated segments; 0 for literal patterns.
    pub fn param_count(&self) -> usize {
        match &self.kind {
            PatternKind::Literal => 0,
            PatternKind::Templated { param_count, .. } => *param_count,
        }
    }

    /// Match a request path, returning extracted path parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = normalize_path(path);
        match &self.kind {
            PatternKind::Literal => (path == self.raw).then(HashMap::new),
            PatternKind::Templated { router, .. } => {
                let matched = router.at(&path).ok()?;
                Some(
                    matched
                        .params
                        .iter()
                        .map(|(name, value)| {
                            let decoded = urlencoding::decode(value)
                                .map(|d| d.into_owned())
                                .unwrap_or_else(|_| value.to_string());
                            (name.to_string(), decoded)
                        })
                        .collect(),
                )
            }
        }
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("raw", &self.raw)
            .field("literal", &self.is_literal())
            .finish()
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PathPattern {}

fn is_param_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with(':')
        && segment[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Leading slash, no trailing slash (except for the root path).
pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
