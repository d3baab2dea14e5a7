//! Derived, rebuildable read cache over the document store.
//!
//! A snapshot is built off to the side and swapped in whole, so a reader
//! holding an `Arc<IndexSnapshot>` always sees one consistent scan. Queries on
//! a stale snapshot return stale answers; the planner refreshes after writes.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use chrono::{DateTime, Duration, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::model::{Priority, Project, ProjectStatus, Status, Task, TaskFilter};
use crate::store::files::{Area, FileStore};

/// Horizon used for the "due soon" figure in stats.
pub const STATS_DUE_SOON_DAYS: i64 = 7;

/// Why a task matched a search; earlier variants rank higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Title,
    Tag,
    Description,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Tag => "tag",
            Self::Description => "description",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub task: &'a Task,
    pub matched: MatchKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_tasks: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub projects: usize,
    pub archived_tasks: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub needing_checkin: usize,
    /// Tag to the active projects using it, on the project or on one of its tasks.
    pub tag_projects: BTreeMap<String, BTreeSet<String>>,
}

struct Entry {
    area: Area,
    task: Task,
    title: String,
    tags: Vec<String>,
    description: String,
}

impl Entry {
    fn new(area: Area, task: Task) -> Self {
        Self {
            title: task.meta.title.to_lowercase(),
            tags: task.meta.tags.iter().map(|t| t.to_lowercase()).collect(),
            description: task.description().unwrap_or_default().to_lowercase(),
            area,
            task,
        }
    }

    /// In the active tree and not finished.
    fn is_current(&self) -> bool {
        self.area == Area::Active && !self.task.meta.status.is_terminal()
    }

    fn best_match(&self, tokens: &[String]) -> Option<MatchKind> {
        tokens
            .iter()
            .filter_map(|token| {
                if self.title.contains(token.as_str()) {
                    Some(MatchKind::Title)
                } else if self.tags.iter().any(|t| t.contains(token.as_str())) {
                    Some(MatchKind::Tag)
                } else if self.description.contains(token.as_str()) {
                    Some(MatchKind::Description)
                } else {
                    None
                }
            })
            .min()
    }
}

/// One complete scan of the workspace.
pub struct IndexSnapshot {
    fingerprint: String,
    built_at: DateTime<Utc>,
    entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
    projects: Vec<Project>,
    tag_projects: BTreeMap<String, BTreeSet<String>>,
    due_sorted: Vec<usize>,
}

impl IndexSnapshot {
    fn empty() -> Self {
        Self {
            fingerprint: String::new(),
            built_at: DateTime::<Utc>::MIN_UTC,
            entries: vec![],
            by_id: HashMap::new(),
            projects: vec![],
            tag_projects: BTreeMap::new(),
            due_sorted: vec![],
        }
    }

    /// Full rescan. The fingerprint is taken first so a write racing the scan
    /// leaves the snapshot marked stale.
    pub fn build(store: &FileStore) -> Result<Self> {
        let fingerprint = store.fingerprint()?;
        let projects = store.list_projects(true)?;
        let entries: Vec<Entry> = store
            .list_all()?
            .into_iter()
            .map(|(area, task)| Entry::new(area, task))
            .collect();

        let by_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.task.meta.id.clone(), i))
            .collect();

        let mut tag_projects: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for project in projects.iter().filter(|p| p.meta.status == ProjectStatus::Active) {
            for tag in &project.meta.tags {
                tag_projects
                    .entry(tag.clone())
                    .or_default()
                    .insert(project.meta.id.clone());
            }
        }
        for entry in entries.iter().filter(|e| e.area == Area::Active) {
            for tag in &entry.task.meta.tags {
                tag_projects
                    .entry(tag.clone())
                    .or_default()
                    .insert(entry.task.meta.project_dir().to_string());
            }
        }

        let mut due_sorted: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_current() && e.task.meta.due.is_some())
            .map(|(i, _)| i)
            .collect();
        due_sorted.sort_by(|&a, &b| {
            let (a, b) = (&entries[a].task.meta, &entries[b].task.meta);
            (a.due, &a.id).cmp(&(b.due, &b.id))
        });

        debug!(tasks = entries.len(), projects = projects.len(), "index rebuilt");
        Ok(Self {
            fingerprint,
            built_at: Utc::now(),
            entries,
            by_id,
            projects,
            tag_projects,
            due_sorted,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.by_id.get(id).map(|&i| &self.entries[i].task)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.meta.id == id)
    }

    pub fn projects(&self, include_archived: bool) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| include_archived || p.meta.status == ProjectStatus::Active)
            .collect()
    }

    /// Tasks matching `filter`; the archive tree is only visited with `include_archived`.
    pub fn tasks(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.entries
            .iter()
            .filter(|e| filter.include_archived || e.area == Area::Active)
            .filter(|e| filter.matches(&e.task.meta))
            .map(|e| &e.task)
            .collect()
    }

    pub fn tag_projects(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.tag_projects
    }

    /// Open tasks with a due date, earliest first.
    pub fn due_sorted(&self) -> Vec<&Task> {
        self.due_sorted.iter().map(|&i| &self.entries[i].task).collect()
    }

    /// Any query token as a substring of title, tag or description.
    /// Title matches first, then tag, then description; ties newest first, then by id.
    pub fn search(&self, query: &str) -> Vec<SearchHit<'_>> {
        let tokens: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            return vec![];
        }
        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .filter(|e| e.area == Area::Active && e.task.meta.status != Status::Archived)
            .filter_map(|e| {
                e.best_match(&tokens).map(|matched| SearchHit {
                    task: &e.task,
                    matched,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            (a.matched, Reverse(a.task.meta.updated), &a.task.meta.id).cmp(&(
                b.matched,
                Reverse(b.task.meta.updated),
                &b.task.meta.id,
            ))
        });
        hits
    }

    /// Open tasks whose last check-in (or creation) is more than `hours` old.
    pub fn needing_checkin(&self, now: DateTime<Utc>, hours: u32) -> Vec<&Task> {
        let cutoff = now - Duration::hours(i64::from(hours));
        self.entries
            .iter()
            .filter(|e| e.is_current())
            .filter(|e| e.task.meta.last_checkin.unwrap_or(e.task.meta.created) < cutoff)
            .map(|e| &e.task)
            .collect()
    }

    /// Due strictly before `today` and not done.
    pub fn overdue(&self, today: NaiveDate) -> Vec<&Task> {
        self.due_sorted()
            .into_iter()
            .filter(|t| t.meta.due.is_some_and(|due| due < today))
            .collect()
    }

    /// Due in `[today, today + days]`, both ends inclusive. A horizon past the
    /// last representable date covers everything from `today` on.
    pub fn due_soon(&self, today: NaiveDate, days: i64) -> Vec<&Task> {
        let horizon = TimeDelta::try_days(days.max(0))
            .and_then(|span| today.checked_add_signed(span))
            .unwrap_or(NaiveDate::MAX);
        self.due_sorted()
            .into_iter()
            .filter(|t| t.meta.due.is_some_and(|due| due >= today && due <= horizon))
            .collect()
    }

    pub fn stats(&self, today: NaiveDate, now: DateTime<Utc>, checkin_hours: u32) -> Stats {
        let mut stats = Stats::default();
        for status in [Status::Todo, Status::InProgress, Status::Done] {
            stats.by_status.insert(status.to_string(), 0);
        }
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            stats.by_priority.insert(priority.to_string(), 0);
        }
        for entry in &self.entries {
            let meta = &entry.task.meta;
            if entry.area == Area::Archive || meta.status == Status::Archived {
                stats.archived_tasks += 1;
                continue;
            }
            stats.total_tasks += 1;
            *stats.by_status.entry(meta.status.to_string()).or_default() += 1;
            *stats.by_priority.entry(meta.priority.to_string()).or_default() += 1;
        }
        stats.projects = self.projects(false).len();
        stats.overdue = self.overdue(today).len();
        stats.due_soon = self.due_soon(today, STATS_DUE_SOON_DAYS).len();
        stats.needing_checkin = self.needing_checkin(now, checkin_hours).len();
        stats.tag_projects = self.tag_projects.clone();
        stats
    }
}

/// Holder that swaps snapshots atomically.
pub struct Index {
    current: RwLock<Arc<IndexSnapshot>>,
    rebuilding: Mutex<()>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::empty())),
            rebuilding: Mutex::new(()),
        }
    }
}

impl Index {
    pub fn build(store: &FileStore) -> Result<Self> {
        let index = Self::default();
        index.rebuild(store)?;
        Ok(index)
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, snapshot: Arc<IndexSnapshot>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Rescan now, waiting for any rebuild already in flight.
    pub fn rebuild(&self, store: &FileStore) -> Result<Arc<IndexSnapshot>> {
        let _guard = self.rebuilding.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::new(IndexSnapshot::build(store)?);
        self.swap(snapshot.clone());
        Ok(snapshot)
    }

    /// Rescan only when the files changed. A caller that finds another
    /// rebuild already running gets the current snapshot instead of waiting.
    pub fn refresh_if_stale(&self, store: &FileStore) -> Result<Arc<IndexSnapshot>> {
        let current = self.snapshot();
        if current.fingerprint == store.fingerprint()? {
            return Ok(current);
        }
        let _guard = match self.rebuilding.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("index rebuild in flight, serving previous snapshot");
                return Ok(current);
            }
        };
        let snapshot = Arc::new(IndexSnapshot::build(store)?);
        self.swap(snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewProject, NewTask, TaskUpdate};
    use tempfile::tempdir;

    fn task(store: &FileStore, title: &str) -> Task {
        store
            .create_task(NewTask {
                title: title.into(),
                ..NewTask::default()
            })
            .unwrap()
    }

    #[test]
    fn search_ranks_title_over_tag_over_description() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        store
            .create_task(NewTask {
                title: "Write copy".into(),
                description: Some("Text for the homepage hero".into()),
                ..NewTask::default()
            })
            .unwrap();
        store
            .create_task(NewTask {
                title: "Pick fonts".into(),
                tags: vec!["homepage".into()],
                ..NewTask::default()
            })
            .unwrap();
        task(&store, "Redesign Homepage");
        task(&store, "Unrelated");

        let snap = IndexSnapshot::build(&store).unwrap();
        let hits = snap.search("HOMEPAGE");
        let ids: Vec<&str> = hits.iter().map(|h| h.task.id()).collect();
        assert_eq!(ids, vec!["task-003", "task-002", "task-001"]);
        assert_eq!(hits[0].matched, MatchKind::Title);
        assert!(snap.search("   ").is_empty());
    }

    #[test]
    fn overdue_and_due_soon_skip_finished_work() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        for (title, due) in [("late", 9), ("today", 10), ("edge", 17), ("later", 18)] {
            store
                .create_task(NewTask {
                    title: title.into(),
                    due: NaiveDate::from_ymd_opt(2026, 2, due),
                    ..NewTask::default()
                })
                .unwrap();
        }
        let snap = IndexSnapshot::build(&store).unwrap();
        let overdue: Vec<&str> = snap.overdue(today).iter().map(|t| t.id()).collect();
        assert_eq!(overdue, vec!["task-001"]);
        let soon: Vec<&str> = snap.due_soon(today, 7).iter().map(|t| t.id()).collect();
        assert_eq!(soon, vec!["task-002", "task-003"]);

        store
            .update_task(
                "task-001",
                TaskUpdate {
                    status: Some(Status::Done),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        let snap = IndexSnapshot::build(&store).unwrap();
        assert!(snap.overdue(today).is_empty());
    }

    #[test]
    fn due_soon_with_huge_horizon_covers_everything_ahead() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        for (title, due) in [("past", "2026-02-01"), ("far", "9999-12-31")] {
            store
                .create_task(NewTask {
                    title: title.into(),
                    due: due.parse().ok(),
                    ..NewTask::default()
                })
                .unwrap();
        }
        let snap = IndexSnapshot::build(&store).unwrap();
        for days in [100_000_000, i64::MAX] {
            let soon: Vec<&str> = snap.due_soon(today, days).iter().map(|t| t.id()).collect();
            assert_eq!(soon, vec!["task-002"], "{days}");
        }
        assert!(snap.due_soon(NaiveDate::MAX, 1).is_empty());
    }

    #[test]
    fn checkin_uses_created_when_never_checked_in() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        task(&store, "A");
        let snap = IndexSnapshot::build(&store).unwrap();
        let now = Utc::now();
        assert!(snap.needing_checkin(now, 24).is_empty());
        assert_eq!(snap.needing_checkin(now + Duration::hours(25), 24).len(), 1);
    }

    #[test]
    fn archived_tasks_leave_current_views() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        store
            .create_project(NewProject {
                name: "Site".into(),
                tags: vec!["design".into()],
                ..NewProject::default()
            })
            .unwrap();
        task(&store, "Homepage");
        store.archive_task("task-001").unwrap();

        let snap = IndexSnapshot::build(&store).unwrap();
        assert!(snap.search("homepage").is_empty());
        assert!(snap.tasks(&TaskFilter::default()).is_empty());
        let all = snap.tasks(&TaskFilter {
            include_archived: true,
            ..TaskFilter::default()
        });
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].meta.status, Status::Archived);

        let stats = snap.stats(Utc::now().date_naive(), Utc::now(), 24);
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.archived_tasks, 1);
        assert_eq!(stats.projects, 2);
        assert!(snap.tag_projects()["design"].contains("site"));
        assert_eq!(stats.tag_projects, *snap.tag_projects());
    }

    #[test]
    fn refresh_only_rebuilds_when_files_change() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path()).unwrap();
        let index = Index::build(&store).unwrap();
        let first = index.snapshot();

        let same = index.refresh_if_stale(&store).unwrap();
        assert!(Arc::ptr_eq(&first, &same));

        task(&store, "A");
        let fresh = index.refresh_if_stale(&store).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(fresh.task("task-001").is_some());
        assert!(first.task("task-001").is_none());
    }
}
