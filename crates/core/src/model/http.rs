//! HTTP binding of an operation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const DEFAULT_URI: &str = "/";
pub const DEFAULT_CODE: u16 = 200;

/// `{label}` or `{label+}` in a URI template.
static URI_LABEL: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(\+)?\}"));

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
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

    /// Case-insensitive parse; `None` for anything outside the supported set.
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    /// Whether a request with this method carries a body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query or header parameter bound to an input member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpParam {
    /// Member name on the input shape.
    pub member: String,
    /// Name on the wire (query key or header name).
    pub name: String,
}

/// Concrete HTTP binding of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpBinding {
    pub method: HttpMethod,
    pub uri: String,
    pub code: u16,
    /// Labels in URI order, greedy marker stripped.
    pub path_params: Vec<String>,
    pub query_params: Vec<HttpParam>,
    pub header_params: Vec<HttpParam>,
}

impl Default for HttpBinding {
    fn default() -> Self {
        Self {
            method: HttpMethod::default(),
            uri: DEFAULT_URI.to_string(),
            code: DEFAULT_CODE,
            path_params: Vec::new(),
            query_params: Vec::new(),
            header_params: Vec::new(),
        }
    }
}

/// A label found in a URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriLabel {
    pub name: String,
    pub greedy: bool,
}

/// Scan a URI template left to right for `{name}` / `{name+}` labels.
pub fn uri_labels(uri: &str) -> Vec<UriLabel> {
    let Ok(pattern) = URI_LABEL.as_ref() else {
        return Vec::new();
    };
    pattern
        .captures_iter(uri)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_string();
            Some(UriLabel {
                name,
                greedy: caps.get(2).is_some(),
            })
        })
        .collect()
}

/// Label names of a URI template, in order.
pub fn extract_path_params(uri: &str) -> Vec<String> {
    uri_labels(uri).into_iter().map(|label| label.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_params_keep_order_and_strip_greedy_marker() {
        assert_eq!(
            extract_path_params("/buckets/{bucket}/items/{key+}"),
            vec!["bucket".to_string(), "key".to_string()]
        );
    }

    #[test]
    fn test_greedy_labels_are_flagged() {
        let labels = uri_labels("/files/{path+}");
        assert_eq!(labels.len(), 1);
        assert!(labels[0].greedy);
        assert!(!uri_labels("/posts/{id}")[0].greedy);
    }

    #[test]
    fn test_uri_without_labels() {
        assert!(extract_path_params("/posts").is_empty());
        assert!(extract_path_params("/").is_empty());
    }

    #[test]
    fn test_default_binding() {
        let binding = HttpBinding::default();
        assert_eq!(binding.method, HttpMethod::Post);
        assert_eq!(binding.uri, "/");
        assert_eq!(binding.code, 200);
        assert!(binding.path_params.is_empty());
    }

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("Delete"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("TRACE"), None);
    }
}
