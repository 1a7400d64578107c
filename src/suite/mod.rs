//! API suite definitions
//!
//! A suite file is a YAML list of HTTP test cases:
//!
//! ```yaml
//! tests:
//!   - name: health_endpoint
//!     section: Health
//!     case_id: C101
//!     method: GET
//!     path: /health
//!     expect:
//!       status: 200
//!       body_contains: ["ok"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::http::{HttpRequest, HttpResponse};

/// Parsed suite file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteDefinition {
    /// Headers sent with every request
    #[serde(default)]
    pub default_headers: HashMap<String, String>,

    pub tests: Vec<SuiteTest>,
}

impl SuiteDefinition {
    /// Load a suite from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse suite file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let suite: Self = serde_yaml::from_str(content)?;
        suite.validate()?;
        Ok(suite)
    }

    fn validate(&self) -> Result<()> {
        if self.tests.is_empty() {
            anyhow::bail!("suite defines no tests");
        }

        let mut seen = std::collections::HashSet::new();
        for test in &self.tests {
            if test.name.trim().is_empty() {
                anyhow::bail!("suite contains a test without a name");
            }
            if !seen.insert(test.node_id()) {
                anyhow::bail!("duplicate test '{}'", test.node_id());
            }
        }
        Ok(())
    }
}

/// One HTTP test case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteTest {
    pub name: String,

    #[serde(default = "default_section")]
    pub section: String,

    /// TestRail case id, written as `C101` or `101`
    #[serde(default, deserialize_with = "deserialize_case_id")]
    pub case_id: Option<u64>,

    #[serde(default = "default_method")]
    pub method: String,

    pub path: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub expect: Expectations,

    #[serde(default)]
    pub skip: bool,

    #[serde(default)]
    pub skip_reason: Option<String>,
}

impl SuiteTest {
    pub fn node_id(&self) -> String {
        format!("{}::{}", self.section, self.name)
    }

    /// Build the request, layering suite-wide headers under the test's own
    pub fn to_request(&self, default_headers: &HashMap<String, String>) -> HttpRequest {
        let mut request = HttpRequest::new(&self.method, &self.path)
            .headers(default_headers.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            request = request.body(body);
        }
        request
    }
}

/// Assertions applied to a response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Expectations {
    /// Expected status code; any 2xx when absent
    #[serde(default)]
    pub status: Option<u16>,

    #[serde(default)]
    pub body_contains: Vec<String>,

    /// Header name and expected value
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub max_duration_ms: Option<u64>,
}

impl Expectations {
    /// Every unmet expectation, empty when the response passes
    pub fn check(&self, response: &HttpResponse) -> Vec<String> {
        let mut failures = Vec::new();

        match self.status {
            Some(expected) if response.status_code != expected => failures.push(format!(
                "expected status {expected}, got {}",
                response.status_code
            )),
            None if !response.is_success() => failures.push(format!(
                "expected a 2xx status, got {}",
                response.status_code
            )),
            _ => {}
        }

        for needle in &self.body_contains {
            if !response.body_contains(needle) {
                failures.push(format!("body does not contain '{needle}'"));
            }
        }

        for (name, expected) in &self.headers {
            match response.header(name) {
                Some(actual) if actual == expected => {}
                Some(actual) => failures.push(format!(
                    "header {name}: expected '{expected}', got '{actual}'"
                )),
                None => failures.push(format!("header {name} missing")),
            }
        }

        if let Some(limit) = self.max_duration_ms {
            if response.duration_ms > limit {
                failures.push(format!(
                    "took {}ms, limit {limit}ms",
                    response.duration_ms
                ));
            }
        }

        failures
    }
}

/// Parse a tracker case id such as `C101`, `c101` or `101`
pub fn parse_case_id(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix('C')
        .or_else(|| trimmed.strip_prefix('c'))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn deserialize_case_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCaseId {
        Number(u64),
        Text(String),
    }

    match Option::<RawCaseId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawCaseId::Number(n)) => Ok(Some(n)),
        Some(RawCaseId::Text(s)) => parse_case_id(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid case id '{s}'"))),
    }
}

fn default_section() -> String {
    "General".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}
