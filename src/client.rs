//! HTTP client for the remote task service.
//!
//! This module owns everything about the wire: endpoint paths, request
//! payload construction, and decoding of the service's response shapes into
//! the models in `task`. Decoding is kept in standalone functions so the
//! service's two double-encoding quirks (suggestion payloads and the risk
//! body, both JSON strings inside JSON) are testable without a server.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::task::{AssignmentPair, Risk, SuggestionEntry, Task};

/// Default service address when neither `--base-url` nor `WORKBOARD_URL`
/// is given. The host/port is a deployment detail, not part of the contract.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Errors that can occur when talking to the task service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP transport failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    #[error("service error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the service.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The response arrived but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

/// Operations offered by the remote task service.
///
/// The TUI and CLI only ever see this trait; tests substitute an in-memory
/// fake that records calls.
pub trait TaskService {
    /// Fetch all currently unassigned work items.
    fn fetch_unassigned_tasks(&self) -> Result<Vec<Task>, ServiceError>;

    /// Fetch risk items flagged by the service.
    fn fetch_risk_items(&self) -> Result<Vec<Risk>, ServiceError>;

    /// Request AI assignment suggestions for the given work item ids.
    fn suggest_assignments(&self, task_ids: &[u64]) -> Result<Vec<SuggestionEntry>, ServiceError>;

    /// Assign a single work item to the given user.
    fn assign_task(&self, task_id: &str, email: &str) -> Result<(), ServiceError>;

    /// Assign several work items in one call. Treated as all-or-nothing.
    fn bulk_assign(&self, pairs: &[AssignmentPair]) -> Result<(), ServiceError>;
}

// Wire shapes. The work-item response nests the interesting fields inside an
// Azure-DevOps-style "System.*" field bag.

#[derive(Deserialize)]
struct WorkItemsResponse {
    #[serde(rename = "workItems")]
    work_items: Vec<RawWorkItem>,
}

#[derive(Deserialize)]
struct RawWorkItem {
    id: u64,
    #[serde(default)]
    url: String,
    fields: RawWorkItemFields,
}

#[derive(Deserialize)]
struct RawWorkItemFields {
    #[serde(rename = "System.WorkItemType", default)]
    work_item_type: String,
    #[serde(rename = "System.State", default)]
    state: String,
    #[serde(rename = "System.Title", default)]
    title: String,
}

#[derive(Deserialize)]
struct NestedAssignments {
    assignments: Vec<RawCandidate>,
}

#[derive(Deserialize)]
struct RawCandidate {
    email: Option<String>,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RiskItemsResponse {
    items: Vec<RawRiskItem>,
}

#[derive(Deserialize)]
struct RawRiskItem {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    assigned_to: String,
    #[serde(default)]
    team_project: String,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    priority_score: f64,
}

/// Decode the unassigned-tasks response body into `Task` models.
pub fn decode_work_items(body: &str) -> Result<Vec<Task>, ServiceError> {
    let parsed: WorkItemsResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::Shape(format!("work items response: {e}")))?;
    Ok(parsed
        .work_items
        .into_iter()
        .map(|item| Task {
            id: item.id,
            url: item.url,
            work_item_type: item.fields.work_item_type,
            state: item.fields.state,
            title: item.fields.title,
        })
        .collect())
}

/// Decode the suggestion response body into review entries.
///
/// The service returns an array of single-key objects whose value is itself
/// a JSON-encoded string of `{"assignments": [{"email", "reason"}, ...]}`.
/// Only the first candidate per task is kept. Any unparsable nested payload
/// fails the whole decode so callers never see a partially-built list.
pub fn decode_suggestions(body: &str) -> Result<Vec<SuggestionEntry>, ServiceError> {
    let parsed: Vec<serde_json::Map<String, Value>> = serde_json::from_str(body)
        .map_err(|e| ServiceError::Shape(format!("suggestion response: {e}")))?;

    let mut entries: Vec<SuggestionEntry> = Vec::with_capacity(parsed.len());
    for obj in parsed {
        let (task_id, raw) = obj
            .iter()
            .next()
            .ok_or_else(|| ServiceError::Shape("empty suggestion object".into()))?;
        let nested = raw
            .as_str()
            .ok_or_else(|| {
                ServiceError::Shape(format!("suggestion for task {task_id} is not a string"))
            })?;
        let decoded: NestedAssignments = serde_json::from_str(nested).map_err(|e| {
            ServiceError::Shape(format!("nested suggestion payload for task {task_id}: {e}"))
        })?;

        // A task id never appears twice in the review list.
        if entries.iter().any(|e| e.task_id == *task_id) {
            continue;
        }

        let first = decoded.assignments.into_iter().next();
        entries.push(SuggestionEntry {
            task_id: task_id.clone(),
            email: first.as_ref().and_then(|c| c.email.clone()),
            reason: first.and_then(|c| c.reason),
        });
    }
    Ok(entries)
}

/// Decode the risk-filter response body into `Risk` models.
///
/// The body is a JSON-encoded string wrapping `{"items": [...]}`.
pub fn decode_risk_items(body: &str) -> Result<Vec<Risk>, ServiceError> {
    let inner: String = serde_json::from_str(body)
        .map_err(|e| ServiceError::Shape(format!("risk response wrapper: {e}")))?;
    let parsed: RiskItemsResponse = serde_json::from_str(&inner)
        .map_err(|e| ServiceError::Shape(format!("risk items: {e}")))?;
    Ok(parsed
        .items
        .into_iter()
        .map(|item| Risk {
            id: item.id,
            title: item.title,
            state: item.state,
            assigned_to: item.assigned_to,
            project: item.team_project,
            priority: item.priority,
            severity: item.severity,
            due_date: item
                .due_date
                .as_deref()
                .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            priority_score: item.priority_score,
        })
        .collect())
}

/// Blocking HTTP implementation of [`TaskService`].
pub struct HttpTaskService {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpTaskService {
    /// Create a client against the given base URL (trailing slash tolerated).
    pub fn new(base_url: &str) -> Self {
        HttpTaskService {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success response to [`ServiceError::Api`], passing the
    /// response through unchanged otherwise.
    fn check(
        resp: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ServiceError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: resp.text().unwrap_or_default(),
            });
        }
        Ok(resp)
    }
}

impl TaskService for HttpTaskService {
    fn fetch_unassigned_tasks(&self) -> Result<Vec<Task>, ServiceError> {
        let url = self.url("/api/automated_task_assignment/fetch_unassigned_tasks");
        debug!(%url, "fetching unassigned tasks");
        let resp = Self::check(self.http.get(&url).send()?)?;
        decode_work_items(&resp.text()?)
    }

    fn fetch_risk_items(&self) -> Result<Vec<Risk>, ServiceError> {
        let url = self.url("/api/risk/filter_risk_items");
        debug!(%url, "fetching risk items");
        let resp = Self::check(self.http.get(&url).send()?)?;
        decode_risk_items(&resp.text()?)
    }

    fn suggest_assignments(&self, task_ids: &[u64]) -> Result<Vec<SuggestionEntry>, ServiceError> {
        let url = self.url("/api/status_report/generate_gpt_task_assignment");
        debug!(%url, count = task_ids.len(), "requesting assignment suggestions");
        let body = serde_json::json!({ "task_ids": task_ids });
        let resp = Self::check(self.http.post(&url).json(&body).send()?)?;
        decode_suggestions(&resp.text()?)
    }

    fn assign_task(&self, task_id: &str, email: &str) -> Result<(), ServiceError> {
        let url = self.url(&format!(
            "/api/automated_task_assignment/update_work_item/{task_id}/{email}"
        ));
        debug!(%url, "assigning work item");
        Self::check(self.http.post(&url).send()?)?;
        Ok(())
    }

    fn bulk_assign(&self, pairs: &[AssignmentPair]) -> Result<(), ServiceError> {
        let url = self.url("/api/automated_task_assignment/bulk_update");
        debug!(%url, count = pairs.len(), "bulk assigning work items");
        Self::check(self.http.post(&url).json(pairs).send()?)?;
        Ok(())
    }
}
