//! Plain description of an inbound HTTP request.
//!
//! The handler never touches an ambient request context; the host adapts its
//! own request type into a `CallbackRequest` and passes it in explicitly.

use url::Url;

/// The parts of an inbound request the handler needs: scheme, host (with
/// port, if any), path, and decoded query parameters in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl CallbackRequest {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter. Repeats are preserved.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Build a request description from an absolute URL.
    pub fn from_url(input: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(input)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            path: url.path().to_string(),
            query: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        })
    }

    /// The value of `name` when it occurs exactly once, `None` otherwise.
    ///
    /// Protocol parameters (`state`, `code`) are rejected when repeated, so a
    /// duplicated parameter can never smuggle a second value past validation.
    pub fn single_query(&self, name: &str) -> Option<&str> {
        let mut found = None;
        for (key, value) in &self.query {
            if key == name {
                if found.is_some() {
                    return None;
                }
                found = Some(value.as_str());
            }
        }
        found
    }

    /// The first value of `name`, if present.
    pub fn first_query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Percent-encoded query string, rebuilt from the decoded pairs.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// The full URL of this request.
    pub fn current_url(&self) -> String {
        let mut url = format!("{}://{}{}", self.scheme, self.host, self.path);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query_string());
        }
        url
    }
}
