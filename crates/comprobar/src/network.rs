//! Network Request Interception
//!
//! Short-circuit matched requests with synthetic responses before they reach
//! the network. Unmatched requests pass through untouched.
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: Patterns are compiled once at registration
//! - **Jidoka**: Overlapping or over-broad routes are surfaced by [`Interceptor::audit`]
//! - **Muda**: Only the requests a fixture stands in for are intercepted

use crate::result::{HarnessError, HarnessResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    #[default]
    #[serde(rename = "*")]
    Any,
}

impl HttpMethod {
    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

/// A synthetic HTTP response served in place of the real endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticResponse {
    /// HTTP status code
    pub status: u16,
    /// Content type
    pub content_type: String,
    /// Extra response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
}

impl SyntheticResponse {
    /// Create a response with an explicit status, content type and body
    #[must_use]
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// 200 response carrying an ES module
    #[must_use]
    pub fn javascript(source: impl Into<String>) -> Self {
        Self::new(200, "application/javascript", source.into().into_bytes())
    }

    /// 200 response carrying JSON
    pub fn json<T: Serialize>(data: &T) -> HarnessResult<Self> {
        Ok(Self::new(200, "application/json", serde_json::to_vec(data)?))
    }

    /// 200 plain-text response
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self::new(200, "text/plain", content.as_bytes().to_vec())
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        let _ = self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Get body as string
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// All headers to send, content type first
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("Content-Type".to_string(), self.content_type.clone())];
        pairs.extend(
            self.headers
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("content-type"))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        pairs
    }
}

/// Pattern for matching request URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Glob pattern: `**` matches anything, `*` anything but `/`
    Glob(String),
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
}

impl UrlPattern {
    /// Glob pattern shorthand
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Check if a URL matches this pattern.
    ///
    /// Compiles on every call; hot paths go through [`RouteRule`] instead.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        Matcher::compile(self).is_match(url)
    }

    /// Translate a glob into an anchored regex source
    fn glob_to_regex(glob: &str) -> String {
        let mut out = String::with_capacity(glob.len() * 2 + 2);
        out.push('^');
        let mut chars = glob.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '*' {
                if chars.peek() == Some(&'*') {
                    let _ = chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            } else {
                out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            }
        }
        out.push('$');
        out
    }
}

impl From<&str> for UrlPattern {
    fn from(s: &str) -> Self {
        Self::Glob(s.to_string())
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Glob(s) | Self::Exact(s) | Self::Prefix(s) | Self::Contains(s) => {
                write!(f, "{s}")
            }
            Self::Regex(s) => write!(f, "/{s}/"),
        }
    }
}

/// Compiled form of a [`UrlPattern`]
#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Prefix(String),
    Contains(String),
    Regex(Regex),
    /// Pattern failed to compile; matches nothing
    Never,
}

impl Matcher {
    fn compile(pattern: &UrlPattern) -> Self {
        let source = match pattern {
            UrlPattern::Exact(s) => return Self::Exact(s.clone()),
            UrlPattern::Prefix(s) => return Self::Prefix(s.clone()),
            UrlPattern::Contains(s) => return Self::Contains(s.clone()),
            UrlPattern::Regex(s) => s.clone(),
            UrlPattern::Glob(s) => UrlPattern::glob_to_regex(s),
        };
        match Regex::new(&source) {
            Ok(re) => Self::Regex(re),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "route pattern does not compile; it will match nothing");
                Self::Never
            }
        }
    }

    fn is_match(&self, url: &str) -> bool {
        match self {
            Self::Exact(p) => url == p,
            Self::Prefix(p) => url.starts_with(p.as_str()),
            Self::Contains(p) => url.contains(p.as_str()),
            Self::Regex(re) => re.is_match(url),
            Self::Never => false,
        }
    }
}

/// A registered interception rule
#[derive(Debug, Clone)]
pub struct RouteRule {
    name: String,
    pattern: UrlPattern,
    method: HttpMethod,
    response: Arc<SyntheticResponse>,
    matcher: Matcher,
}

impl RouteRule {
    /// Create a rule matching any method
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: UrlPattern, response: SyntheticResponse) -> Self {
        let matcher = Matcher::compile(&pattern);
        Self {
            name: name.into(),
            pattern,
            method: HttpMethod::Any,
            response: Arc::new(response),
            matcher,
        }
    }

    /// Restrict the rule to one HTTP method
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Rule name (usually the fixture's logical service name)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL pattern
    #[must_use]
    pub const fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    /// Synthetic response served on match
    #[must_use]
    pub fn response(&self) -> &SyntheticResponse {
        &self.response
    }

    /// Check if this rule matches a request
    #[must_use]
    pub fn matches(&self, url: &str, method: &HttpMethod) -> bool {
        self.method.matches(method) && self.matcher.is_match(url)
    }
}

/// What to do with a paused request
#[derive(Debug, Clone)]
pub enum InterceptDecision {
    /// Answer with the synthetic response; the network is never contacted
    Fulfill {
        /// Name of the rule that matched
        rule: String,
        /// Response to serve
        response: Arc<SyntheticResponse>,
    },
    /// Let the request continue to the network unchanged
    Continue,
}

impl InterceptDecision {
    /// Whether the request was answered locally
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfill { .. })
    }
}

/// One observed request and what the interceptor did with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptRecord {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Rule that served it, if any
    pub rule: Option<String>,
    /// Other rules that also matched (should always be empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_matched: Vec<String>,
}

impl InterceptRecord {
    /// Whether the request was answered by a rule
    #[must_use]
    pub const fn fulfilled(&self) -> bool {
        self.rule.is_some()
    }
}

/// Ordered set of route rules plus a log of every decision made.
///
/// Rules are evaluated in registration order and the first match wins.
#[derive(Debug, Default)]
pub struct Interceptor {
    rules: Vec<RouteRule>,
    log: Mutex<Vec<InterceptRecord>>,
}

impl Interceptor {
    /// Create an empty interceptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule
    pub fn register_route(&mut self, rule: RouteRule) {
        debug!(rule = rule.name(), pattern = %rule.pattern(), "route registered");
        self.rules.push(rule);
    }

    /// Registered rules in order
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Number of registered rules
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.rules.len()
    }

    /// Decide how to handle a request and record the decision
    pub fn decide(&self, url: &str, method: HttpMethod) -> InterceptDecision {
        let mut matching = self.rules.iter().filter(|r| r.matches(url, &method));
        let first = matching.next();
        let also_matched: Vec<String> = matching.map(|r| r.name.clone()).collect();

        if let Some(rule) = first {
            if !also_matched.is_empty() {
                warn!(url, rule = rule.name(), others = ?also_matched, "request matched more than one route");
            }
        }

        let record = InterceptRecord {
            url: url.to_string(),
            method,
            rule: first.map(|r| r.name.clone()),
            also_matched,
        };
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);

        match first {
            Some(rule) => {
                debug!(url, rule = rule.name(), status = rule.response.status, "fulfilled");
                InterceptDecision::Fulfill {
                    rule: rule.name.clone(),
                    response: Arc::clone(&rule.response),
                }
            }
            None => {
                debug!(url, "passed through");
                InterceptDecision::Continue
            }
        }
    }

    /// Every recorded decision in arrival order
    #[must_use]
    pub fn records(&self) -> Vec<InterceptRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests served by any rule whose URL matches `pattern`
    #[must_use]
    pub fn fulfilled_for(&self, pattern: &UrlPattern) -> Vec<InterceptRecord> {
        let matcher = Matcher::compile(pattern);
        self.records()
            .into_iter()
            .filter(|r| r.fulfilled() && matcher.is_match(&r.url))
            .collect()
    }

    /// Requests that went to the network
    #[must_use]
    pub fn passed_through(&self) -> Vec<InterceptRecord> {
        self.records()
            .into_iter()
            .filter(|r| !r.fulfilled())
            .collect()
    }

    /// How many requests a rule served
    #[must_use]
    pub fn hits(&self, rule: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.rule.as_deref() == Some(rule))
            .count()
    }

    /// Check that every rule stood in for exactly one endpoint.
    ///
    /// Fails if a request matched several rules, or if one rule served more
    /// than one distinct URL (query and fragment ignored).
    pub fn audit(&self) -> HarnessResult<()> {
        let records = self.records();

        if let Some(overlap) = records.iter().find(|r| !r.also_matched.is_empty()) {
            let rule = overlap.rule.clone().unwrap_or_default();
            return Err(HarnessError::RouteMismatch {
                pattern: self.pattern_of(&rule),
                message: format!(
                    "{} also matched {}",
                    overlap.url,
                    overlap.also_matched.join(", ")
                ),
            });
        }

        for rule in &self.rules {
            let endpoints: BTreeSet<&str> = records
                .iter()
                .filter(|r| r.rule.as_deref() == Some(rule.name()))
                .map(|r| strip_query(&r.url))
                .collect();
            if endpoints.len() > 1 {
                return Err(HarnessError::RouteMismatch {
                    pattern: rule.pattern.to_string(),
                    message: format!(
                        "served {} distinct endpoints: {}",
                        endpoints.len(),
                        endpoints.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    fn pattern_of(&self, rule: &str) -> String {
        self.rules
            .iter()
            .find(|r| r.name == rule)
            .map(|r| r.pattern.to_string())
            .unwrap_or_else(|| rule.to_string())
    }
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
