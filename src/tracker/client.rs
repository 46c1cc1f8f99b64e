use std::fmt;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{SearchPage, Sprint, Tracker};
use crate::error::{Error, Result};

/// Page size used when a search or sprint listing must be fetched in full.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const SESSION_COOKIE: &str = "JSESSIONID";

/// Basic-auth credentials for the tracker.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Jira REST client.
pub struct JiraClient {
    http: reqwest::Client,
    base: Url,
    auth: Option<Credentials>,
    page_size: u32,
}

#[derive(Deserialize)]
struct FilterDef {
    jql: String,
}

#[derive(Deserialize)]
struct SprintPage {
    #[serde(default)]
    values: Vec<Sprint>,
    #[serde(default, rename = "isLast")]
    is_last: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, rename = "errorMessages")]
    error_messages: Vec<String>,
}

impl JiraClient {
    /// Connect to a Jira server, optionally authenticating.
    ///
    /// Rejected credentials are not fatal: the client falls back to anonymous
    /// access. When the server hands out a session cookie, basic auth is
    /// dropped for the rest of the session. Any other failure to reach the
    /// server is a login error.
    pub async fn connect(endpoint: &str, credentials: Option<Credentials>) -> Result<Self> {
        let base = normalize_base(endpoint)?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Login(e.to_string()))?;
        let mut client = Self {
            http,
            base,
            auth: credentials,
            page_size: DEFAULT_PAGE_SIZE,
        };

        match client.check_server().await {
            Ok(has_session) => {
                if has_session && client.auth.is_some() {
                    log::debug!("Jira session cookie established, dropping basic auth");
                    client.auth = None;
                }
            }
            Err(e) if client.auth.is_some() && e.is_auth_denied() => {
                log::warn!("Authentication to Jira failed, continuing unauthenticated");
                client.auth = None;
                client.check_server().await.map_err(login_error)?;
            }
            Err(e) => return Err(login_error(e)),
        }

        Ok(client)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether requests still carry basic-auth credentials.
    pub fn uses_basic_auth(&self) -> bool {
        self.auth.is_some()
    }

    /// Check the server is reachable. Returns true if a session cookie was set.
    async fn check_server(&self) -> Result<bool> {
        let url = self.url("rest/api/2/serverInfo")?;
        let resp = self.get(url).send().await?;
        let resp = check_status(resp, "server info").await?;
        let has_session = resp.cookies().any(|c| c.name() == SESSION_COOKIE);
        Ok(has_session)
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let req = self.http.get(url);
        match &self.auth {
            Some(c) => req.basic_auth(&c.user, Some(&c.password)),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let url = self.url(path)?;
        log::debug!("GET {url} {query:?}");
        let resp = self.get(url).query(query).send().await?;
        let resp = check_status(resp, what).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn search_page(
        &self,
        jql: &str,
        fields: &str,
        start_at: u64,
        max_results: u32,
    ) -> Result<SearchPage> {
        let query = [
            ("jql", jql.to_string()),
            ("fields", fields.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        self.get_json("rest/api/2/search", &query, "search").await
    }
}

#[async_trait]
impl Tracker for JiraClient {
    async fn filter_jql(&self, filter_id: u64) -> Result<String> {
        let path = format!("rest/api/2/filter/{filter_id}");
        let filter: FilterDef = self
            .get_json(&path, &[], &format!("filter {filter_id}"))
            .await?;
        Ok(filter.jql)
    }

    async fn search_issues(
        &self,
        jql: &str,
        fields: &[&str],
        limit: Option<u32>,
    ) -> Result<SearchPage> {
        let fields = fields.join(",");
        if let Some(limit) = limit {
            return self.search_page(jql, &fields, 0, limit).await;
        }

        let mut all = SearchPage::default();
        loop {
            let start_at = all.issues.len() as u64;
            let page = self
                .search_page(jql, &fields, start_at, self.page_size)
                .await?;
            all.total = page.total;
            let fetched = page.issues.len();
            all.issues.extend(page.issues);
            if fetched == 0 || all.issues.len() as u64 >= all.total {
                break;
            }
        }
        Ok(all)
    }

    async fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>> {
        let path = format!("rest/agile/1.0/board/{board_id}/sprint");
        let what = format!("board {board_id}");
        let mut sprints = Vec::new();
        loop {
            let query = [
                ("startAt", sprints.len().to_string()),
                ("maxResults", self.page_size.to_string()),
            ];
            let page: SprintPage = self.get_json(&path, &query, &what).await?;
            let fetched = page.values.len();
            sprints.extend(page.values);
            if page.is_last || fetched == 0 {
                break;
            }
        }
        Ok(sprints)
    }

    async fn completed_issues_estimate_sum(&self, board_id: u64, sprint_id: u64) -> Result<f64> {
        let query = [
            ("rapidViewId", board_id.to_string()),
            ("sprintId", sprint_id.to_string()),
        ];
        let what = format!("sprint report {board_id}/{sprint_id}");
        let report: Value = self
            .get_json("rest/greenhopper/1.0/rapid/charts/sprintreport", &query, &what)
            .await?;
        report
            .pointer("/contents/completedIssuesEstimateSum/value")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::NotFound(format!("completed estimate sum in {what}")))
    }
}

/// Ensure the base URL ends with a slash so relative joins keep any context path.
fn normalize_base(endpoint: &str) -> Result<Url> {
    let mut base = Url::parse(endpoint)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

async fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(what.to_string()));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: error_message(&body, status),
    })
}

fn error_message(body: &str, status: StatusCode) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error_messages.is_empty() => parsed.error_messages.join("; "),
        _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
    }
}

fn login_error(e: Error) -> Error {
    match e {
        Error::Login(_) => e,
        other => Error::Login(other.to_string()),
    }
}
