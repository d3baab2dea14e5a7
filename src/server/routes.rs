use std::collections::HashMap;
use std::fs;

use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tiny_http::Method;
use tracing::{debug, warn};

use crate::build_info;
use crate::error::{PlannerError, Result};
use crate::model::{Priority, Status, TaskFilter};
use crate::output::{project_summary, search_hit, task_detail, task_summary};
use crate::server::SERVICE_NAME;
use crate::store::repo::Planner;

const DEFAULT_DUE_SOON_DAYS: i64 = 7;
const ATTACHMENT_CACHE: &str = "public, max-age=300";

/// A response before it is handed to the socket.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type", "application/json".into()),
                ("Access-Control-Allow-Origin", "*".into()),
            ],
            body: value.to_string().into_bytes(),
        }
    }

    fn ok(value: Value) -> Self {
        Self::json(200, &value)
    }

    fn error(err: &PlannerError) -> Self {
        let status = err.http_status();
        if status >= 500 {
            warn!(error = %err, "api request failed");
        }
        // Attachment lookups never echo the requested path back.
        let message = match err {
            PlannerError::AttachmentNotFound(_) | PlannerError::PathEscape(_) => {
                "not found".to_string()
            }
            other => other.to_string(),
        };
        Self::json(status, &json!({ "error": err.code(), "message": message }))
    }

    fn not_found() -> Self {
        Self::json(404, &json!({ "error": "not_found", "message": "no such endpoint" }))
    }

    fn method_not_allowed() -> Self {
        Self::json(
            405,
            &json!({ "error": "method_not_allowed", "message": "method not allowed" }),
        )
    }

    /// JSON body as a value; only used by tests and the health probe.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct TodayBody {
    #[serde(default)]
    task_ids: Vec<String>,
}

/// Route one request. Never panics on user input; every failure is a JSON error.
pub fn handle(planner: &Planner, method: &Method, url: &str, body: &str) -> ApiResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let query = parse_query(query);
    let segments: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_default())
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    debug!(method = %method, path = %path, "api request");

    if *method == Method::Options {
        let mut response = ApiResponse::json(204, &Value::Null);
        response.body.clear();
        response
            .headers
            .push(("Access-Control-Allow-Methods", "GET, POST, OPTIONS".into()));
        response
            .headers
            .push(("Access-Control-Allow-Headers", "Content-Type".into()));
        return response;
    }

    let result = match (method, segments.as_slice()) {
        (Method::Get, ["api", "health"]) => Ok(health(planner)),
        (Method::Get, ["api", "stats"]) => stats(planner),
        (Method::Get, ["api", "projects"]) => projects(planner, &query),
        (Method::Get, ["api", "project", id]) => project(planner, id),
        (Method::Get, ["api", "tasks"]) => tasks(planner, &query),
        (Method::Get, ["api", "task", id]) => planner.get_task(id).map(|t| task_detail(&t)),
        (Method::Get, ["api", "search"]) => search(planner, &query),
        (Method::Get, ["api", "due-soon"]) => due_soon(planner, &query),
        (Method::Get, ["api", "overdue"]) => overdue(planner),
        (Method::Get, ["api", "checkins"]) => checkins(planner),
        (Method::Get, ["api", "today"]) => today(planner),
        (Method::Post, ["api", "today"]) => set_today(planner, body),
        (Method::Get, ["api", "attachment", project, filename]) => {
            return attachment(planner, project, filename);
        }
        (_, ["api", "health" | "stats" | "projects" | "tasks" | "search" | "today"]) => {
            return ApiResponse::method_not_allowed();
        }
        _ => return ApiResponse::not_found(),
    };

    match result {
        Ok(value) => ApiResponse::ok(value),
        Err(err) => ApiResponse::error(&err),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                let s = s.replace('+', " ");
                urlencoding::decode(&s)
                    .map(|d| d.into_owned())
                    .unwrap_or(s)
            };
            (decode(k), decode(v))
        })
        .collect()
}

fn flag(query: &HashMap<String, String>, key: &str) -> bool {
    query
        .get(key)
        .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "" | "1" | "true" | "yes"))
}

fn health(planner: &Planner) -> Value {
    json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "build": build_info::describe(),
        "git_sha": build_info::git_sha(),
        "workspace": planner.root().display().to_string(),
        "index_built_at": planner.index.snapshot().built_at(),
    })
}

fn stats(planner: &Planner) -> Result<Value> {
    let snapshot = planner.snapshot()?;
    let stats = snapshot.stats(
        Local::now().date_naive(),
        Utc::now(),
        planner.config().checkin_frequency_hours,
    );
    Ok(serde_json::to_value(stats)?)
}

fn projects(planner: &Planner, query: &HashMap<String, String>) -> Result<Value> {
    let include_archived = flag(query, "include_archived");
    let snapshot = planner.snapshot()?;
    let list: Vec<Value> = snapshot
        .projects(include_archived)
        .into_iter()
        .map(|project| {
            let tasks = snapshot.tasks(&TaskFilter {
                project: Some(project.meta.id.clone()),
                include_archived,
                ..TaskFilter::default()
            });
            let mut value = project_summary(project);
            value["task_count"] = json!(tasks.len());
            value["open_count"] = json!(tasks.iter().filter(|t| t.meta.status.is_open()).count());
            value
        })
        .collect();
    Ok(json!(list))
}

fn project(planner: &Planner, id: &str) -> Result<Value> {
    let project = planner.get_project(id)?;
    let tasks = planner.list_tasks(&TaskFilter {
        project: Some(project.meta.id.clone()),
        include_archived: true,
        ..TaskFilter::default()
    })?;
    let mut value = project_summary(&project);
    value["tasks"] = json!(tasks.iter().map(task_summary).collect::<Vec<_>>());
    Ok(value)
}

fn tasks(planner: &Planner, query: &HashMap<String, String>) -> Result<Value> {
    let filter = TaskFilter {
        project: query.get("project").filter(|p| !p.is_empty()).cloned(),
        status: query
            .get("status")
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Status>())
            .transpose()?,
        priority: query
            .get("priority")
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<Priority>())
            .transpose()?,
        tag: query.get("tag").filter(|t| !t.is_empty()).cloned(),
        include_archived: flag(query, "include_archived"),
    };
    let snapshot = planner.snapshot()?;
    let list: Vec<Value> = snapshot.tasks(&filter).into_iter().map(task_summary).collect();
    Ok(json!(list))
}

fn search(planner: &Planner, query: &HashMap<String, String>) -> Result<Value> {
    let q = query.get("q").map(String::as_str).unwrap_or_default();
    let snapshot = planner.snapshot()?;
    let hits: Vec<Value> = snapshot
        .search(q)
        .into_iter()
        .map(|hit| search_hit(hit.task, hit.matched))
        .collect();
    Ok(json!(hits))
}

fn due_soon(planner: &Planner, query: &HashMap<String, String>) -> Result<Value> {
    let days = match query.get("days").filter(|d| !d.is_empty()) {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|d| *d >= 0)
            .ok_or_else(|| PlannerError::Validation(format!("days '{raw}'")))?,
        None => DEFAULT_DUE_SOON_DAYS,
    };
    let snapshot = planner.snapshot()?;
    let list: Vec<Value> = snapshot
        .due_soon(Local::now().date_naive(), days)
        .into_iter()
        .map(task_summary)
        .collect();
    Ok(json!(list))
}

fn overdue(planner: &Planner) -> Result<Value> {
    let snapshot = planner.snapshot()?;
    let list: Vec<Value> = snapshot
        .overdue(Local::now().date_naive())
        .into_iter()
        .map(task_summary)
        .collect();
    Ok(json!(list))
}

fn checkins(planner: &Planner) -> Result<Value> {
    let snapshot = planner.snapshot()?;
    let list: Vec<Value> = snapshot
        .needing_checkin(Utc::now(), planner.config().checkin_frequency_hours)
        .into_iter()
        .map(task_summary)
        .collect();
    Ok(json!(list))
}

fn today(planner: &Planner) -> Result<Value> {
    Ok(serde_json::to_value(planner.today(Local::now().date_naive())?)?)
}

fn set_today(planner: &Planner, body: &str) -> Result<Value> {
    let parsed: TodayBody = serde_json::from_str(body)
        .map_err(|e| PlannerError::Validation(format!("expected {{\"task_ids\": [...]}}: {e}")))?;
    let focus = planner.set_today(Local::now().date_naive(), &parsed.task_ids)?;
    Ok(serde_json::to_value(focus)?)
}

fn attachment(planner: &Planner, project: &str, filename: &str) -> ApiResponse {
    let read = planner
        .store
        .attachment_path(project, filename)
        .and_then(|path| Ok(fs::read(path)?));
    match read {
        Ok(bytes) => {
            let mime = mime_guess::from_path(filename).first_or_octet_stream();
            ApiResponse {
                status: 200,
                headers: vec![
                    ("Content-Type", mime.essence_str().to_string()),
                    ("Cache-Control", ATTACHMENT_CACHE.into()),
                    ("Access-Control-Allow-Origin", "*".into()),
                ],
                body: bytes,
            }
        }
        Err(err) => {
            debug!(project = %project, error = %err, "attachment not served");
            ApiResponse::error(&PlannerError::AttachmentNotFound(filename.to_string()))
        }
    }
}
