use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::info;

use crate::body::Subtask;
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    NewProject, NewTask, Project, ProjectUpdate, Status, Task, TaskFilter, TaskUpdate,
};
use crate::store::files::{AttachmentRef, FileStore};
use crate::store::index::{Index, IndexSnapshot, MatchKind};
use crate::store::today::{TodayFocus, TodayStore};

/// Store, index and today list for one workspace.
///
/// Every mutating call rebuilds the index before it returns, so a read after
/// a write through the same planner never sees the old state.
pub struct Planner {
    pub store: FileStore,
    pub index: Index,
    pub today: TodayStore,
}

impl Planner {
    /// Open an existing workspace and build the index.
    pub fn open(root: &Path) -> Result<Self> {
        Self::from_store(FileStore::open(root)?)
    }

    /// Create (or re-initialise) a workspace and open it.
    pub fn init(root: &Path) -> Result<Self> {
        Self::from_store(FileStore::init(root)?)
    }

    fn from_store(store: FileStore) -> Result<Self> {
        let index = Index::build(&store)?;
        let today = TodayStore::open(store.root());
        Ok(Self {
            store,
            index,
            today,
        })
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }

    /// Current snapshot, rescanned first if files changed behind our back.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.index.refresh_if_stale(&self.store)
    }

    fn written<T>(&self, value: T) -> Result<T> {
        self.index.rebuild(&self.store)?;
        Ok(value)
    }

    // ── projects ─────────────────────────────────────────────────────

    pub fn create_project(&self, new: NewProject) -> Result<Project> {
        let project = self.store.create_project(new)?;
        self.written(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Project> {
        self.store.get_project(id)
    }

    pub fn list_projects(&self, include_archived: bool) -> Result<Vec<Project>> {
        self.store.list_projects(include_archived)
    }

    pub fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<Project> {
        let project = self.store.update_project(id, update)?;
        self.written(project)
    }

    pub fn archive_project(&self, id: &str) -> Result<Project> {
        let project = self.store.archive_project(id)?;
        self.written(project)
    }

    // ── tasks ────────────────────────────────────────────────────────

    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        let task = self.store.create_task(new)?;
        self.written(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.store.get_task(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.store.list_tasks(filter)
    }

    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        let task = self.store.update_task(id, update)?;
        self.written(task)
    }

    pub fn move_task(&self, id: &str, project: &str) -> Result<Task> {
        let task = self.store.move_task(id, project)?;
        self.written(task)
    }

    pub fn link_tasks(&self, dependent: &str, depends_on: &str) -> Result<Task> {
        let task = self.store.link_tasks(dependent, depends_on)?;
        self.written(task)
    }

    pub fn archive_task(&self, id: &str) -> Result<Task> {
        let task = self.store.archive_task(id)?;
        self.written(task)
    }

    pub fn check_in(&self, id: &str) -> Result<Task> {
        let task = self.store.check_in(id)?;
        self.written(task)
    }

    pub fn agent_tips(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.store.get_task(id)?.agent_tips())
    }

    pub fn set_agent_tips(&self, id: &str, tips: &[String], replace: bool) -> Result<Task> {
        let task = self.store.set_agent_tips(id, tips, replace)?;
        self.written(task)
    }

    pub fn subtasks(&self, id: &str) -> Result<Vec<Subtask>> {
        Ok(self.store.get_task(id)?.subtasks())
    }

    pub fn set_subtasks(&self, id: &str, subtasks: &[Subtask]) -> Result<Task> {
        let task = self.store.set_subtasks(id, subtasks)?;
        self.written(task)
    }

    pub fn add_subtasks(&self, id: &str, titles: &[String]) -> Result<Task> {
        let task = self.store.add_subtasks(id, titles)?;
        self.written(task)
    }

    pub fn toggle_subtask(&self, id: &str, index: usize) -> Result<Task> {
        let task = self.store.toggle_subtask(id, index)?;
        self.written(task)
    }

    pub fn add_attachment(
        &self,
        project: &str,
        source: &Path,
        new_name: Option<&str>,
    ) -> Result<AttachmentRef> {
        self.store.add_attachment(project, source, new_name)
    }

    /// Copy a file into the task's project and link it from the task body.
    pub fn attach_to_task(
        &self,
        id: &str,
        source: &Path,
        new_name: Option<&str>,
    ) -> Result<(Task, AttachmentRef)> {
        let project = self.store.get_task(id)?.meta.project_dir().to_string();
        let attachment = self.store.add_attachment(&project, source, new_name)?;
        let task = self.store.link_attachment(id, &attachment)?;
        self.written((task, attachment))
    }

    /// Archive done tasks not touched for `auto_archive_completed_days`.
    /// A zero setting turns this off. Returns the archived ids.
    pub fn auto_archive_completed(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let days = self.config().auto_archive_completed_days;
        if days == 0 {
            return Ok(vec![]);
        }
        let cutoff = now - Duration::days(i64::from(days));
        let stale: Vec<String> = self
            .store
            .list_tasks(&TaskFilter {
                status: Some(Status::Done),
                ..TaskFilter::default()
            })?
            .into_iter()
            .filter(|t| t.meta.updated < cutoff)
            .map(|t| t.meta.id)
            .collect();

        for id in &stale {
            self.store.archive_task(id)?;
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "auto-archived completed tasks");
        }
        self.written(stale)
    }

    // ── index queries ────────────────────────────────────────────────

    pub fn search(&self, query: &str) -> Result<Vec<(Task, MatchKind)>> {
        Ok(self
            .snapshot()?
            .search(query)
            .into_iter()
            .map(|hit| (hit.task.clone(), hit.matched))
            .collect())
    }

    pub fn needing_checkin(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let hours = self.config().checkin_frequency_hours;
        Ok(cloned(self.snapshot()?.needing_checkin(now, hours)))
    }

    pub fn overdue(&self, today: NaiveDate) -> Result<Vec<Task>> {
        Ok(cloned(self.snapshot()?.overdue(today)))
    }

    pub fn due_soon(&self, today: NaiveDate, days: i64) -> Result<Vec<Task>> {
        Ok(cloned(self.snapshot()?.due_soon(today, days)))
    }

    // ── today focus ──────────────────────────────────────────────────

    pub fn today(&self, today: NaiveDate) -> Result<TodayFocus> {
        self.today.get(today)
    }

    pub fn set_today(&self, today: NaiveDate, task_ids: &[String]) -> Result<TodayFocus> {
        self.today.set(today, task_ids)
    }
}

fn cloned(tasks: Vec<&Task>) -> Vec<Task> {
    tasks.into_iter().cloned().collect()
}
