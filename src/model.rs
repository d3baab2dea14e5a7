use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};

use crate::body::{Body, SectionName, Subtask};
use crate::error::{PlannerError, Result};

/// Project id used for tasks that have no project.
pub const INBOX_ID: &str = "inbox";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
    Archived,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

impl Status {
    /// Done and archived tasks drop out of every "current" view.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Archived)
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Todo | Self::InProgress)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Done => write!(f, "done"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for Status {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in-progress" | "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            other => Err(PlannerError::Validation(format!(
                "status '{other}' (expected todo, in-progress, done)"
            ))),
        }
    }
}

impl FromStr for Priority {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(PlannerError::Validation(format!(
                "priority '{other}' (expected low, medium, high)"
            ))),
        }
    }
}

/// Parse a calendar due date in `YYYY-MM-DD` form.
pub fn parse_due(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| PlannerError::Validation(format!("due date '{input}' (expected YYYY-MM-DD)")))
}

/// Percent complete, `0..=100`.
pub fn validate_progress(progress: u8) -> Result<u8> {
    if progress > 100 {
        return Err(PlannerError::Validation(format!(
            "progress {progress} (expected 0-100)"
        )));
    }
    Ok(progress)
}

/// Percent of subtasks checked, rounded half up; `None` without subtasks.
pub fn subtask_progress(done: usize, total: usize) -> Option<u8> {
    if total == 0 {
        return None;
    }
    u8::try_from((done.min(total) * 200 + total) / (total * 2)).ok()
}

/// Frontmatter of a task file. Field order is the on-disk key order; keys this
/// struct does not know are carried in `extensions` and written back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient::project")]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "lenient::due")]
    pub due: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub updated: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub last_checkin: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "lenient::progress")]
    pub progress: u8,
    #[serde(default)]
    pub subtask_count: usize,
    #[serde(default)]
    pub subtask_done: usize,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub extensions: serde_yaml::Mapping,
}

impl TaskMeta {
    /// Trim whitespace, drop empty entries, then deduplicate and sort for deterministic storage.
    pub fn normalize(&mut self) {
        normalize_set(&mut self.tags);
        normalize_set(&mut self.dependencies);
        if self.project.as_deref() == Some(INBOX_ID) {
            self.project = None;
        }
    }

    /// Directory name under `projects/` (or `archive/`) that holds this task.
    pub fn project_dir(&self) -> &str {
        self.project.as_deref().unwrap_or(INBOX_ID)
    }

    /// Re-derive the fields that mirror body content.
    pub fn sync_from_body(&mut self, body: &Body) {
        let subtasks = body.subtasks();
        self.subtask_count = subtasks.len();
        self.subtask_done = subtasks.iter().filter(|s| s.done).count();
        if let Some(progress) = subtask_progress(self.subtask_done, self.subtask_count) {
            self.progress = progress;
        }
        self.thumbnail = body.first_image();
    }
}

fn normalize_set(values: &mut Vec<String>) {
    for value in values.iter_mut() {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
    values.retain(|v| !v.is_empty());
    values.sort();
    values.dedup();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub meta: TaskMeta,
    pub body: Body,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn description(&self) -> Option<&str> {
        self.body.section(&SectionName::Description)
    }

    pub fn subtasks(&self) -> Vec<Subtask> {
        self.body.subtasks()
    }

    pub fn agent_tips(&self) -> Vec<String> {
        self.body.bullets(&SectionName::AgentTips)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extensions: serde_yaml::Mapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub meta: ProjectMeta,
    pub body: Body,
}

impl Project {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn description(&self) -> String {
        self.body
            .section(&SectionName::Description)
            .unwrap_or_default()
            .to_string()
    }

    pub fn goals(&self) -> Vec<String> {
        self.body.bullets(&SectionName::Goals)
    }
}

/// Input for task creation; omitted fields take defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub title: String,
    #[serde(alias = "project_id")]
    pub project: Option<String>,
    pub description: Option<String>,
    pub context: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due: Option<NaiveDate>,
    pub progress: Option<u8>,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub notes: Vec<String>,
    pub subtasks: Vec<String>,
    pub agent_tips: Vec<String>,
}

/// Shallow partial update: only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    #[serde(deserialize_with = "lenient::double_option")]
    pub due: Option<Option<NaiveDate>>,
    pub progress: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub last_checkin: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub context: Option<String>,
    pub notes: Option<String>,
}

impl TaskUpdate {
    pub fn touches_body(&self) -> bool {
        self.description.is_some() || self.context.is_some() || self.notes.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub goals: Vec<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub goals: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskFilter {
    pub project: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub include_archived: bool,
}

impl TaskFilter {
    pub fn matches(&self, meta: &TaskMeta) -> bool {
        if let Some(project) = self.project.as_deref()
            && meta.project_dir() != project
        {
            return false;
        }
        if self.status.is_some_and(|s| s != meta.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != meta.priority) {
            return false;
        }
        if let Some(tag) = self.tag.as_deref()
            && !meta.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        self.include_archived || meta.status != Status::Archived
    }
}

/// Turn a human title into a stable id: lowercase ASCII words joined by '-'.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Hand-edited frontmatter is accepted in the looser shapes people actually type.
mod lenient {
    use super::*;

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    pub fn optional_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => {
                parse_timestamp(&raw).map(Some).map_err(serde::de::Error::custom)
            }
            _ => Ok(None),
        }
    }

    pub fn due<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => {
                parse_due(&raw).map(Some).map_err(serde::de::Error::custom)
            }
            _ => Ok(None),
        }
    }

    /// Out-of-range values are clamped rather than rejected.
    pub fn progress<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u8, D::Error> {
        let raw = Option::<i64>::deserialize(d)?.unwrap_or(0);
        Ok(raw.clamp(0, 100) as u8)
    }

    pub fn project<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
        Ok(Option::<String>::deserialize(d)?
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && p != INBOX_ID))
    }

    pub fn double_option<'de, D, T>(d: D) -> std::result::Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(d).map(Some)
    }

    fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("invalid timestamp '{raw}'"))
    }
}
