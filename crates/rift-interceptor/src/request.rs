//! Normalized request model consumed by the dispatcher.
//!
//! The platform shim turns a native request into an [`InterceptedRequest`]:
//! method, absolute URL, headers, decoded search params and a body parsed
//! according to its content type.

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// HTTP methods an interceptor can register handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(RequestError::InvalidMethod(other.to_string())),
        }
    }
}

/// Errors raised while normalizing a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),
    #[error("Invalid request URL '{0}': expected an absolute http(s) URL")]
    InvalidUrl(String),
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
}

/// Parsed request or response body.
///
/// Also used as the declared value of body restrictions, where `Empty`
/// stands for "no body" (null).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
    /// `application/x-www-form-urlencoded` entries, in order. Keys may repeat.
    Form(Vec<(String, String)>),
    Binary(Bytes),
}

impl Body {
    pub fn json(value: serde_json::Value) -> Self {
        Body::Json(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Body::Text(value.into())
    }

    pub fn form<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Body::Form(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Default content type for a response carrying this body.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Json(_) => Some("application/json"),
            Body::Text(_) => Some("text/plain"),
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
            Body::Binary(_) => Some("application/octet-stream"),
        }
    }

    /// Serialize the body back to bytes.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Json(value) => Bytes::from(value.to_string()),
            Body::Text(text) => Bytes::from(text.clone()),
            Body::Form(entries) => Bytes::from(encode_form(entries)),
            Body::Binary(bytes) => bytes.clone(),
        }
    }

    /// Loggable representation used by diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Body::Empty => "null".to_string(),
            Body::Json(value) => value.to_string(),
            Body::Text(text) => text.clone(),
            Body::Form(entries) => encode_form(entries),
            Body::Binary(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

fn encode_form(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// A request observed by an interceptor, in normalized form.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: HttpMethod,
    /// Absolute URL as received
    pub url: String,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Decoded search params, in order. Keys may repeat.
    pub search_params: Vec<(String, String)>,
    pub body: Body,
    /// Raw body bytes, kept when parsing under the declared content type failed
    pub raw_body: Bytes,
    /// Parse error for a malformed body, if any
    pub body_error: Option<String>,
    /// Path parameters extracted from the matched path pattern
    pub path_params: HashMap<String, String>,
}

impl InterceptedRequest {
    /// Create a request without headers or body.
    pub fn new(method: HttpMethod, url: &str) -> Result<Self, RequestError> {
        let uri = parse_absolute_url(url)?;
        let search_params = parse_query_string(uri.query());
        Ok(Self {
            method,
            url: url.to_string(),
            uri,
            headers: HeaderMap::new(),
            search_params,
            body: Body::Empty,
            raw_body: Bytes::new(),
            body_error: None,
            path_params: HashMap::new(),
        })
    }

    /// Normalize a request from its raw parts, parsing the body according to
    /// its `content-type` header.
    ///
    /// A body that cannot be parsed under its declared content type does not
    /// fail normalization: the parsed body is `Body::Empty`, the bytes are kept
    /// in `raw_body` and the error in `body_error`.
    pub fn from_parts<I, K, V>(
        method: &str,
        url: &str,
        headers: I,
        raw_body: Bytes,
    ) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::new(method.parse()?, url)?;
        for (name, value) in headers {
            request.append_header(name.as_ref(), value.as_ref())?;
        }

        let content_type = request.header(CONTENT_TYPE.as_str()).map(str::to_string);
        match parse_body(content_type.as_deref(), &raw_body) {
            Ok(body) => request.body = body,
            Err(error) => {
                warn!(
                    "Failed to parse request body as {}: {}",
                    content_type.as_deref().unwrap_or("unknown content type"),
                    error
                );
                request.body_error = Some(error);
            }
        }
        request.raw_body = raw_body;
        Ok(request)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, RequestError> {
        self.append_header(name, value)?;
        Ok(self)
    }

    pub fn with_body(mut self, body: Body) -> Self {
        if let Some(content_type) = body.content_type() {
            if !self.headers.contains_key(CONTENT_TYPE) {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }
        self.raw_body = body.to_bytes();
        self.body = body;
        self
    }

    fn append_header(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        let header_name = HeaderName::from_str(name)
            .map_err(|_| RequestError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| RequestError::InvalidHeader(name.to_string()))?;
        self.headers.append(header_name, header_value);
        Ok(())
    }

    /// URL path, without query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// First value of a header (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
    }

    /// Headers as lowercased name/value pairs, one entry per value. Values
    /// that are not valid UTF-8 are decoded lossily.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    /// First value of a search param.
    pub fn search_param(&self, name: &str) -> Option<&str> {
        self.search_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a search param, in order.
    pub fn search_param_values(&self, name: &str) -> Vec<&str> {
        self.search_params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }
}

/// Parse an absolute http(s) URL.
pub(crate) fn parse_absolute_url(url: &str) -> Result<Uri, RequestError> {
    let uri: Uri = url
        .parse()
        .map_err(|_| RequestError::InvalidUrl(url.to_string()))?;
    match (uri.scheme_str(), uri.authority()) {
        (Some("http") | Some("https"), Some(_)) => Ok(uri),
        _ => Err(RequestError::InvalidUrl(url.to_string())),
    }
}

/// Parse a query string into ordered, URL-decoded pairs.
pub fn parse_query_string(query: Option<&str>) -> Vec<(String, String)> {
    query.map(parse_urlencoded).unwrap_or_default()
}

fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        urlencoding::decode(&s)
            .map(|d| d.into_owned())
            .unwrap_or(s)
    };
    input
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode(key), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

/// Parse a raw body according to its content type.
fn parse_body(content_type: Option<&str>, raw: &Bytes) -> Result<Body, String> {
    if raw.is_empty() {
        return Ok(Body::Empty);
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        return serde_json::from_slice(raw)
            .map(Body::Json)
            .map_err(|e| e.to_string());
    }

    if mime == "application/x-www-form-urlencoded" {
        let text = std::str::from_utf8(raw).map_err(|e| e.to_string())?;
        return Ok(Body::Form(parse_urlencoded(text)));
    }

    let textual = mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xml"
        || mime.ends_with("+xml");
    if textual {
        return match std::str::from_utf8(raw) {
            Ok(text) => Ok(Body::Text(text.to_string())),
            Err(_) if mime.is_empty() => Ok(Body::Binary(raw.clone())),
            Err(e) => Err(e.to_string()),
        };
    }

    Ok(Body::Binary(raw.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_relative_url_is_rejected() {
        assert!(InterceptedRequest::new(HttpMethod::Get, "/users").is_err());
        assert!(InterceptedRequest::new(HttpMethod::Get, "ftp://host/users").is_err());
    }

    #[test]
    fn test_search_params_keep_repeated_keys() {
        let request = InterceptedRequest::new(
            HttpMethod::Get,
            "http://localhost/users?tag=a&tag=b&name=hello%20world",
        )
        .unwrap();
        assert_eq!(request.search_param_values("tag"), vec!["a", "b"]);
        assert_eq!(request.search_param("name"), Some("hello world"));
        assert_eq!(request.path(), "/users");
    }

    #[test]
    fn test_json_body_is_parsed() {
        let request = InterceptedRequest::from_parts(
            "POST",
            "http://localhost/users",
            [("Content-Type", "application/json; charset=utf-8")],
            Bytes::from_static(br#"{"message":"ok"}"#),
        )
        .unwrap();
        assert_eq!(request.body, Body::Json(json!({"message": "ok"})));
        assert!(request.body_error.is_none());
    }

    #[test]
    fn test_malformed_json_body_falls_back_to_empty() {
        let request = InterceptedRequest::from_parts(
            "POST",
            "http://localhost/users",
            [("content-type", "application/json")],
            Bytes::from_static(b"{not json"),
        )
        .unwrap();
        assert_eq!(request.body, Body::Empty);
        assert!(request.body_error.is_some());
        assert_eq!(request.raw_body, Bytes::from_static(b"{not json"));
    }

    #[test]
    fn test_form_body_is_decoded() {
        let request = InterceptedRequest::from_parts(
            "POST",
            "http://localhost/login",
            [("content-type", "application/x-www-form-urlencoded")],
            Bytes::from_static(b"user=jane+doe&scope=a&scope=b"),
        )
        .unwrap();
        assert_eq!(
            request.body,
            Body::form([("user", "jane doe"), ("scope", "a"), ("scope", "b")])
        );
    }

    #[test]
    fn test_untyped_body_is_text_or_binary() {
        let text = InterceptedRequest::from_parts(
            "PUT",
            "http://localhost/notes",
            Vec::<(&str, &str)>::new(),
            Bytes::from_static(b"hello"),
        )
        .unwrap();
        assert_eq!(text.body, Body::text("hello"));

        let binary = InterceptedRequest::from_parts(
            "PUT",
            "http://localhost/blobs",
            [("content-type", "application/octet-stream")],
            Bytes::from_static(&[0xff, 0x00, 0x10]),
        )
        .unwrap();
        assert_eq!(binary.body, Body::Binary(Bytes::from_static(&[0xff, 0x00, 0x10])));
    }

    #[test]
    fn test_with_body_sets_content_type() {
        let request = InterceptedRequest::new(HttpMethod::Post, "http://localhost/users")
            .unwrap()
            .with_body(Body::json(json!({"a": 1})));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.raw_body, Bytes::from(r#"{"a":1}"#));
    }

    #[test]
    fn test_non_ascii_header_values_are_kept() {
        let request = InterceptedRequest::new(HttpMethod::Get, "http://localhost/users")
            .unwrap()
            .with_header("x-display-name", "Zoë")
            .unwrap();
        assert_eq!(request.header("x-display-name"), Some("Zoë"));
        assert!(request
            .header_pairs()
            .contains(&("x-display-name".to_string(), "Zoë".to_string())));
    }
}
