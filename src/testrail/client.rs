use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const API_PREFIX: &str = "index.php?/api/v2";

#[derive(Error, Debug)]
pub enum TestRailError {
    #[error(
        "authentication failed for '{username}' at {base_url}; check the API key \
         (TestRail > My Settings > API Keys), the username and the base URL"
    )]
    Unauthorized { username: String, base_url: String },

    #[error("TestRail API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("project '{0}' not found in TestRail")]
    ProjectNotFound(String),

    #[error("invalid case id '{0}'")]
    InvalidCaseId(String),

    #[error("invalid TestRail configuration: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected TestRail response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TestRailError>;

/// Result status ids as defined by TestRail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultStatus {
    Passed = 1,
    Blocked = 2,
    Untested = 3,
    Retest = 4,
    Failed = 5,
}

impl ResultStatus {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(ResultStatus::Passed),
            2 => Some(ResultStatus::Blocked),
            3 => Some(ResultStatus::Untested),
            4 => Some(ResultStatus::Retest),
            5 => Some(ResultStatus::Failed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResultStatus::Passed => "Passed",
            ResultStatus::Blocked => "Blocked",
            ResultStatus::Untested => "Untested",
            ResultStatus::Retest => "Retest",
            ResultStatus::Failed => "Failed",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TestRun {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub passed_count: Option<u64>,
    #[serde(default)]
    pub failed_count: Option<u64>,
    #[serde(default)]
    pub untested_count: Option<u64>,
}

/// Payload of `add_run`
#[derive(Clone, Debug, Serialize)]
pub struct NewRun {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<u64>,
    pub include_all: bool,
    pub case_ids: Vec<u64>,
}

/// One entry of `add_results_for_cases`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaseResult {
    pub case_id: u64,
    pub status_id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Serialize)]
struct ResultsBatch<'a> {
    results: &'a [CaseResult],
}

/// `get_projects` answers with a bare list on older servers
#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectList {
    Paged { projects: Vec<Project> },
    Plain(Vec<Project>),
}

pub struct TestRailClient {
    client: Client,
    base_url: String,
    username: String,
    api_key: String,
}

impl TestRailClient {
    pub fn new(base_url: &str, username: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let base = url::Url::parse(base_url.trim())
            .map_err(|e| TestRailError::Config(format!("invalid base_url: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("qa-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TestRailError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            username: username.trim().to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    fn auth(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.username, Some(&self.api_key))
            .header("Content-Type", "application/json")
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.auth(request).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(TestRailError::Unauthorized {
                username: self.username.clone(),
                base_url: self.base_url.clone(),
            });
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(TestRailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!("GET {}", url);
        self.execute(self.client.get(url)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        self.execute(self.client.post(url).json(body)).await
    }

    /// List projects; doubles as the authentication check
    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        let projects = match self.get::<ProjectList>("get_projects").await? {
            ProjectList::Paged { projects } => projects,
            ProjectList::Plain(projects) => projects,
        };
        Ok(projects)
    }

    pub async fn find_project(&self, name: &str) -> Result<Project> {
        self.get_projects()
            .await?
            .into_iter()
            .find(|project| project.name == name)
            .ok_or_else(|| TestRailError::ProjectNotFound(name.to_string()))
    }

    pub async fn add_run(&self, project_id: u64, run: &NewRun) -> Result<TestRun> {
        self.post(&format!("add_run/{project_id}"), run).await
    }

    pub async fn add_results_for_cases(
        &self,
        run_id: u64,
        results: &[CaseResult],
    ) -> Result<Vec<serde_json::Value>> {
        self.post(
            &format!("add_results_for_cases/{run_id}"),
            &ResultsBatch { results },
        )
        .await
    }

    pub async fn get_run(&self, run_id: u64) -> Result<TestRun> {
        self.get(&format!("get_run/{run_id}")).await
    }
}
