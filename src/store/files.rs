use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::body::{Body, PROJECT_SECTIONS, SectionName, Subtask, TASK_SECTIONS};
use crate::config::{CONFIG_DIR, Config};
use crate::error::{PlannerError, Result};
use crate::frontmatter;
use crate::model::{
    INBOX_ID, NewProject, NewTask, Project, ProjectMeta, ProjectStatus, ProjectUpdate, Status,
    Task, TaskFilter, TaskMeta, TaskUpdate, slugify, validate_progress,
};
use crate::store::atomic::{is_staging_file, write_atomic};
use crate::store::lock;
use crate::workspace::{Workspace, component};

pub const PROJECTS_DIR: &str = "projects";
pub const ARCHIVE_DIR: &str = "archive";
pub const TASKS_DIR: &str = "tasks";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const README: &str = "README.md";

const TASK_ID_PREFIX: &str = "task-";
const TASK_ID_LOCK: &str = "task-id.lock";
const TASK_ID_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Accent colours handed out to new projects, first unused wins.
pub const PROJECT_PALETTE: [&str; 12] = [
    "#84cc16", "#ef4444", "#38bdf8", "#a78bfa", "#eab308", "#ec4899", "#14b8a6", "#f97316",
    "#6366f1", "#06b6d4", "#f43f5e", "#10b981",
];

/// Which top-level tree a document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Active,
    Archive,
}

impl Area {
    pub fn dir(self) -> &'static str {
        match self {
            Self::Active => PROJECTS_DIR,
            Self::Archive => ARCHIVE_DIR,
        }
    }
}

/// Link produced by `add_attachment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    pub name: String,
    /// Workspace-relative location of the stored copy.
    pub path: String,
    /// Link target as written from a task file in the same project.
    pub link: String,
}

/// Markdown documents for one workspace: `projects/`, `archive/` and `.config/`.
pub struct FileStore {
    ws: Workspace,
    config: Config,
}

impl FileStore {
    /// Open an existing workspace.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let ws = Workspace::new(root)?;
        Ok(Self { ws, config })
    }

    /// Create the workspace layout. Safe to run on an existing workspace.
    pub fn init(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let ws = Workspace::new(root)?;
        for dir in [
            CONFIG_DIR,
            "projects/inbox/tasks",
            "projects/inbox/attachments",
            ARCHIVE_DIR,
        ] {
            fs::create_dir_all(ws.resolve([dir])?)?;
        }

        let config = if Config::exists(ws.root()) {
            Config::load(ws.root())?
        } else {
            let config = Config::default();
            config.save(ws.root())?;
            config
        };

        let store = Self { ws, config };
        let inbox = store.readme_path(Area::Active, INBOX_ID)?;
        if !inbox.exists() {
            let mut body = Body::scaffold(PROJECT_SECTIONS);
            body.set_section(
                SectionName::Description,
                "Default project for uncategorized tasks.",
                PROJECT_SECTIONS,
            );
            let project = Project {
                meta: ProjectMeta {
                    id: INBOX_ID.into(),
                    title: "Inbox".into(),
                    status: ProjectStatus::Active,
                    created: Utc::now(),
                    tags: vec![],
                    color: Some(store.next_project_colour()?),
                    extensions: Default::default(),
                },
                body,
            };
            store.write_project(&inbox, &project)?;
        }

        info!(root = %store.root().display(), "workspace initialised");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        self.ws.root()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── paths ────────────────────────────────────────────────────────

    fn project_dir(&self, area: Area, id: &str) -> Result<PathBuf> {
        self.ws.resolve([area.dir(), component(id)?])
    }

    fn readme_path(&self, area: Area, id: &str) -> Result<PathBuf> {
        self.ws.resolve([area.dir(), component(id)?, README])
    }

    fn task_path(&self, area: Area, project: &str, id: &str) -> Result<PathBuf> {
        let file = format!("{}.md", component(id)?);
        self.ws.resolve([area.dir(), component(project)?, TASKS_DIR, file.as_str()])
    }

    /// Sub-directory names of `projects/` or `archive/`, sorted.
    fn project_dirs(&self, area: Area) -> Result<Vec<String>> {
        let dir = self.ws.resolve([area.dir()])?;
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Task documents in one project's `tasks/` directory, sorted by file name.
    fn task_files(&self, area: Area, project: &str) -> Result<Vec<PathBuf>> {
        let dir = self.ws.resolve([area.dir(), project, TASKS_DIR])?;
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".md") && !is_staging_file(&name) && entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Find a task file in the active tree first, then the archive.
    pub fn locate_task(&self, id: &str) -> Result<(Area, PathBuf)> {
        let file = format!("{}.md", component(id)?);
        for area in [Area::Active, Area::Archive] {
            for project in self.project_dirs(area)? {
                let path = self
                    .ws
                    .resolve([area.dir(), project.as_str(), TASKS_DIR, file.as_str()])?;
                if path.is_file() {
                    return Ok((area, path));
                }
            }
        }
        debug!(task = id, "task file not found");
        Err(PlannerError::TaskNotFound(id.to_string()))
    }

    fn locate_project(&self, id: &str) -> Result<(Area, PathBuf)> {
        for area in [Area::Active, Area::Archive] {
            let readme = self.readme_path(area, id)?;
            if readme.is_file() {
                return Ok((area, readme));
            }
        }
        Err(PlannerError::ProjectNotFound(id.to_string()))
    }

    fn require_active_project(&self, id: &str) -> Result<()> {
        if self.readme_path(Area::Active, id)?.is_file() {
            Ok(())
        } else {
            Err(PlannerError::ProjectNotFound(id.to_string()))
        }
    }

    // ── document io ──────────────────────────────────────────────────

    fn read_task_file(&self, path: &Path) -> Result<Task> {
        let raw = fs::read_to_string(path)?;
        let origin = self.ws.relative(path);
        let (meta, body): (TaskMeta, &str) = frontmatter::parse(&raw, &origin)?;
        Ok(Task {
            meta,
            body: Body::parse(body),
        })
    }

    fn write_task_file(&self, path: &Path, task: &Task) -> Result<()> {
        let raw = frontmatter::render(&task.meta, &task.body.render())?;
        write_atomic(path, raw.as_bytes())
    }

    fn read_project_file(&self, path: &Path) -> Result<Project> {
        let raw = fs::read_to_string(path)?;
        let origin = self.ws.relative(path);
        let (meta, body): (ProjectMeta, &str) = frontmatter::parse(&raw, &origin)?;
        Ok(Project {
            meta,
            body: Body::parse(body),
        })
    }

    fn write_project(&self, path: &Path, project: &Project) -> Result<()> {
        let raw = frontmatter::render(&project.meta, &project.body.render())?;
        write_atomic(path, raw.as_bytes())
    }

    /// Workspace-relative location of a task file.
    pub fn task_location(&self, id: &str) -> Result<String> {
        let (_, path) = self.locate_task(id)?;
        Ok(self.ws.relative(&path))
    }

    // ── projects ─────────────────────────────────────────────────────

    fn next_project_colour(&self) -> Result<String> {
        let mut used = Vec::new();
        for project in self.list_projects(false)? {
            if let Some(colour) = project.meta.color {
                used.push(colour.to_ascii_lowercase());
            }
        }
        let colour = PROJECT_PALETTE
            .iter()
            .find(|c| !used.iter().any(|u| u == *c))
            .unwrap_or(&PROJECT_PALETTE[used.len() % PROJECT_PALETTE.len()]);
        Ok(colour.to_string())
    }

    /// Create a project whose id is the slug of `name`. An existing active
    /// project with the same slug is returned unchanged.
    pub fn create_project(&self, new: NewProject) -> Result<Project> {
        let title = new.name.trim().to_string();
        let id = slugify(&title);
        if id.is_empty() {
            return Err(PlannerError::Validation(format!(
                "project name '{}' has no usable characters",
                new.name
            )));
        }
        let readme = self.readme_path(Area::Active, &id)?;
        if readme.is_file() {
            info!(project = %id, "project already exists");
            return self.read_project_file(&readme);
        }
        if self.readme_path(Area::Archive, &id)?.is_file() {
            return Err(PlannerError::Validation(format!(
                "project id '{id}' belongs to an archived project"
            )));
        }
        if let Some(colour) = new.color.as_deref() {
            validate_colour(colour)?;
        }

        let dir = self.project_dir(Area::Active, &id)?;
        fs::create_dir_all(dir.join(TASKS_DIR))?;
        fs::create_dir_all(dir.join(ATTACHMENTS_DIR))?;

        let mut body = Body::scaffold(PROJECT_SECTIONS);
        if let Some(description) = new.description.as_deref() {
            body.set_section(SectionName::Description, description, PROJECT_SECTIONS);
        }
        body.set_bullets(SectionName::Goals, &new.goals, PROJECT_SECTIONS);

        let mut meta = ProjectMeta {
            id: id.clone(),
            title,
            status: ProjectStatus::Active,
            created: Utc::now(),
            tags: new.tags,
            color: match new.color {
                Some(colour) => Some(colour),
                None => Some(self.next_project_colour()?),
            },
            extensions: Default::default(),
        };
        normalize_tags(&mut meta.tags);

        let project = Project { meta, body };
        self.write_project(&readme, &project)?;
        info!(project = %id, "created project");
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Project> {
        let (_, readme) = self.locate_project(id)?;
        self.read_project_file(&readme)
    }

    pub fn list_projects(&self, include_archived: bool) -> Result<Vec<Project>> {
        let mut areas = vec![Area::Active];
        if include_archived {
            areas.push(Area::Archive);
        }
        let mut projects = Vec::new();
        for area in areas {
            for name in self.project_dirs(area)? {
                let readme = self.ws.resolve([area.dir(), name.as_str(), README])?;
                if !readme.is_file() {
                    continue;
                }
                match self.read_project_file(&readme) {
                    Ok(project) => projects.push(project),
                    Err(err) => {
                        warn!(path = %readme.display(), error = %err, "skipping malformed project file");
                    }
                }
            }
        }
        Ok(projects)
    }

    pub fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<Project> {
        if let Some(title) = update.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(PlannerError::Validation("project title cannot be empty".into()));
        }
        if let Some(colour) = update.color.as_deref() {
            validate_colour(colour)?;
        }
        let (_, readme) = self.locate_project(id)?;
        let mut project = self.read_project_file(&readme)?;

        if let Some(title) = update.title {
            project.meta.title = title.trim().to_string();
        }
        if let Some(mut tags) = update.tags {
            normalize_tags(&mut tags);
            project.meta.tags = tags;
        }
        if let Some(colour) = update.color {
            project.meta.color = Some(colour);
        }
        if let Some(description) = update.description.as_deref() {
            project
                .body
                .set_section(SectionName::Description, description, PROJECT_SECTIONS);
        }
        if let Some(goals) = update.goals.as_deref() {
            project.body.set_bullets(SectionName::Goals, goals, PROJECT_SECTIONS);
        }

        self.write_project(&readme, &project)?;
        Ok(project)
    }

    /// Mark a project archived and move its whole directory under `archive/`.
    /// Tasks inside keep their own status.
    pub fn archive_project(&self, id: &str) -> Result<Project> {
        if id == INBOX_ID {
            return Err(PlannerError::Validation("the inbox cannot be archived".into()));
        }
        let readme = self.readme_path(Area::Active, id)?;
        if !readme.is_file() {
            return Err(PlannerError::ProjectNotFound(id.to_string()));
        }
        let src = self.project_dir(Area::Active, id)?;
        let dst = self.project_dir(Area::Archive, id)?;
        if let Some(conflict) = first_merge_conflict(&src, &dst)? {
            return Err(PlannerError::Validation(format!(
                "archive already holds '{}'",
                self.ws.relative(&conflict)
            )));
        }

        let mut project = self.read_project_file(&readme)?;
        relocate_dir(&src, &dst)?;
        project.meta.status = ProjectStatus::Archived;
        self.write_project(&self.readme_path(Area::Archive, id)?, &project)?;
        info!(project = %id, "archived project");
        Ok(project)
    }

    // ── tasks ────────────────────────────────────────────────────────

    /// Highest `task-NNN` counter anywhere in the workspace, archive included.
    fn max_task_counter(&self) -> Result<u32> {
        let mut max = 0;
        for area in [Area::Active, Area::Archive] {
            for project in self.project_dirs(area)? {
                for path in self.task_files(area, &project)? {
                    let counter = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| s.strip_prefix(TASK_ID_PREFIX))
                        .and_then(|s| s.parse::<u32>().ok());
                    if let Some(counter) = counter {
                        max = max.max(counter);
                    }
                }
            }
        }
        Ok(max)
    }

    fn validate_dependencies(&self, own_id: Option<&str>, deps: &[String]) -> Result<()> {
        for dep in deps {
            let dep = dep.trim();
            if dep.is_empty() {
                continue;
            }
            if Some(dep) == own_id {
                return Err(PlannerError::Validation(format!("task {dep} cannot depend on itself")));
            }
            self.locate_task(dep)?;
        }
        Ok(())
    }

    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(PlannerError::Validation("task title cannot be empty".into()));
        }
        if new.status == Some(Status::Archived) {
            return Err(PlannerError::Validation(
                "status 'archived' is only reachable by archiving".into(),
            ));
        }
        let project = new
            .project
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && p != INBOX_ID);
        let project_dir = project.clone().unwrap_or_else(|| INBOX_ID.to_string());
        self.require_active_project(&project_dir)?;
        self.validate_dependencies(None, &new.dependencies)?;
        let progress = new.progress.map(validate_progress).transpose()?.unwrap_or(0);

        let mut body = Body::scaffold(TASK_SECTIONS);
        if let Some(description) = new.description.as_deref() {
            body.set_section(SectionName::Description, description, TASK_SECTIONS);
        }
        if let Some(context) = new.context.as_deref() {
            body.set_section(SectionName::Context, context, TASK_SECTIONS);
        }
        let subtasks: Vec<Subtask> = new
            .subtasks
            .iter()
            .map(|title| Subtask {
                title: title.clone(),
                done: false,
            })
            .collect();
        body.set_subtasks(&subtasks, TASK_SECTIONS);
        body.set_bullets(SectionName::Notes, &new.notes, TASK_SECTIONS);
        body.set_bullets(SectionName::AgentTips, &new.agent_tips, TASK_SECTIONS);

        let _allocation_lock = lock::acquire_lock(
            &self.ws.resolve([CONFIG_DIR, TASK_ID_LOCK])?,
            TASK_ID_LOCK_TIMEOUT,
        )?;
        let id = format!("{TASK_ID_PREFIX}{:03}", self.max_task_counter()? + 1);

        let now = Utc::now();
        let mut task = Task {
            meta: TaskMeta {
                id: id.clone(),
                title,
                status: new.status.unwrap_or_default(),
                priority: new.priority.unwrap_or(self.config.default_priority),
                project,
                due: new.due,
                created: now,
                updated: now,
                last_checkin: Some(now),
                tags: new.tags,
                dependencies: new.dependencies,
                progress,
                subtask_count: 0,
                subtask_done: 0,
                thumbnail: None,
                extensions: Default::default(),
            },
            body,
        };
        task.meta.sync_from_body(&task.body);
        task.meta.normalize();

        let path = self.task_path(Area::Active, &project_dir, &id)?;
        self.write_task_file(&path, &task)?;
        info!(task = %id, project = %project_dir, "created task");
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        let (_, path) = self.locate_task(id)?;
        self.read_task_file(&path)
    }

    /// Read-modify-write of one task in place; stamps `updated` and re-derives counts.
    fn edit_task<F>(&self, id: &str, edit: F) -> Result<Task>
    where
        F: FnOnce(&mut Task, Area) -> Result<()>,
    {
        let (area, path) = self.locate_task(id)?;
        let mut task = self.read_task_file(&path)?;
        edit(&mut task, area)?;
        task.meta.updated = Utc::now();
        task.meta.sync_from_body(&task.body);
        task.meta.normalize();
        self.write_task_file(&path, &task)?;
        Ok(task)
    }

    /// Shallow merge of the supplied fields. The body is left untouched unless
    /// a user section is supplied; Agent Tips is never touched here.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        if update.status == Some(Status::Archived) {
            return Err(PlannerError::Validation(
                "status 'archived' is only reachable by archiving".into(),
            ));
        }
        if let Some(title) = update.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(PlannerError::Validation("task title cannot be empty".into()));
        }
        if let Some(deps) = update.dependencies.as_deref() {
            self.validate_dependencies(Some(id), deps)?;
        }
        if let Some(progress) = update.progress {
            validate_progress(progress)?;
        }

        self.edit_task(id, |task, area| {
            if update.status.is_some() && area == Area::Archive {
                return Err(PlannerError::Validation(format!(
                    "task {id} is archived; its status cannot change"
                )));
            }
            let meta = &mut task.meta;
            if let Some(title) = update.title {
                meta.title = title.trim().to_string();
            }
            if let Some(status) = update.status {
                meta.status = status;
            }
            if let Some(priority) = update.priority {
                meta.priority = priority;
            }
            if let Some(due) = update.due {
                meta.due = due;
            }
            if let Some(progress) = update.progress {
                meta.progress = progress;
            }
            if let Some(tags) = update.tags {
                meta.tags = tags;
            }
            if let Some(deps) = update.dependencies {
                meta.dependencies = deps;
            }
            if let Some(checkin) = update.last_checkin {
                meta.last_checkin = Some(checkin);
            }
            for (name, text) in [
                (SectionName::Description, update.description),
                (SectionName::Context, update.context),
                (SectionName::Notes, update.notes),
            ] {
                if let Some(text) = text {
                    task.body.set_section(name, &text, TASK_SECTIONS);
                }
            }
            Ok(())
        })
    }

    /// Record a check-in touchpoint.
    pub fn check_in(&self, id: &str) -> Result<Task> {
        self.edit_task(id, |task, _| {
            task.meta.last_checkin = Some(Utc::now());
            Ok(())
        })
    }

    /// Rewrite the `project` field and relocate the file: write the new copy,
    /// read it back, then remove the original.
    pub fn move_task(&self, id: &str, target_project: &str) -> Result<Task> {
        let target = target_project.trim();
        let target_dir = if target.is_empty() { INBOX_ID } else { target };
        self.require_active_project(target_dir)?;

        let (area, src) = self.locate_task(id)?;
        if area == Area::Archive {
            return Err(PlannerError::Validation(format!(
                "task {id} is archived and cannot be moved"
            )));
        }
        let mut task = self.read_task_file(&src)?;
        if task.meta.project_dir() == target_dir {
            return Ok(task);
        }

        task.meta.project = Some(target_dir.to_string());
        task.meta.updated = Utc::now();
        task.meta.normalize();

        let dst = self.task_path(Area::Active, target_dir, id)?;
        if dst.exists() {
            return Err(PlannerError::Validation(format!(
                "{} already exists",
                self.ws.relative(&dst)
            )));
        }
        self.write_task_file(&dst, &task)?;

        let written = self.read_task_file(&dst);
        if !matches!(&written, Ok(copy) if copy.meta == task.meta) {
            let _ = fs::remove_file(&dst);
            return Err(PlannerError::CorruptDocument(
                self.ws.relative(&dst),
                "moved copy did not read back intact; original kept".into(),
            ));
        }
        fs::remove_file(&src)?;
        info!(task = %id, project = %target_dir, "moved task");
        Ok(task)
    }

    /// Record that `dependent` depends on `depends_on`.
    pub fn link_tasks(&self, dependent: &str, depends_on: &str) -> Result<Task> {
        if dependent == depends_on {
            return Err(PlannerError::Validation(format!(
                "task {dependent} cannot depend on itself"
            )));
        }
        let other = self.get_task(depends_on)?;
        if other.meta.dependencies.iter().any(|d| d == dependent) {
            return Err(PlannerError::Validation(format!(
                "circular dependency: {depends_on} already depends on {dependent}"
            )));
        }
        let current = self.get_task(dependent)?;
        if current.meta.dependencies.iter().any(|d| d == depends_on) {
            debug!(task = dependent, on = depends_on, "link already exists");
            return Ok(current);
        }
        self.edit_task(dependent, |task, _| {
            task.meta.dependencies.push(depends_on.to_string());
            Ok(())
        })
    }

    /// The only way to reach `status: archived`: mark, write into `archive/`, remove original.
    /// A task that arrived in `archive/` with its project is marked where it lies.
    pub fn archive_task(&self, id: &str) -> Result<Task> {
        let (area, src) = self.locate_task(id)?;
        let mut task = self.read_task_file(&src)?;
        if area == Area::Archive && task.meta.status == Status::Archived {
            return Err(PlannerError::Validation(format!("task {id} is already archived")));
        }
        task.meta.status = Status::Archived;
        task.meta.updated = Utc::now();

        if area == Area::Archive {
            self.write_task_file(&src, &task)?;
            info!(task = %id, "marked task archived in place");
            return Ok(task);
        }
        let dst = self.task_path(Area::Archive, task.meta.project_dir(), id)?;
        self.write_task_file(&dst, &task)?;
        fs::remove_file(&src)?;
        info!(task = %id, "archived task");
        Ok(task)
    }

    pub fn set_agent_tips(&self, id: &str, tips: &[String], replace: bool) -> Result<Task> {
        self.edit_task(id, |task, _| {
            let mut all = if replace { vec![] } else { task.agent_tips() };
            all.extend(tips.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()));
            task.body.set_bullets(SectionName::AgentTips, &all, TASK_SECTIONS);
            Ok(())
        })
    }

    /// Replace the checklist; completing every item marks the task done,
    /// completing some moves a todo task to in-progress. Progress follows the
    /// checked share and drops to zero when the list is emptied.
    pub fn set_subtasks(&self, id: &str, subtasks: &[Subtask]) -> Result<Task> {
        self.edit_task(id, |task, area| {
            task.body.set_subtasks(subtasks, TASK_SECTIONS);
            if subtasks.is_empty() {
                task.meta.progress = 0;
            }
            if area == Area::Active {
                sync_status_from_subtasks(task);
            }
            Ok(())
        })
    }

    pub fn add_subtasks(&self, id: &str, titles: &[String]) -> Result<Task> {
        let mut subtasks = self.get_task(id)?.subtasks();
        subtasks.extend(
            titles
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| Subtask {
                    title: t.to_string(),
                    done: false,
                }),
        );
        self.set_subtasks(id, &subtasks)
    }

    pub fn toggle_subtask(&self, id: &str, index: usize) -> Result<Task> {
        let mut subtasks = self.get_task(id)?.subtasks();
        let count = subtasks.len();
        let Some(item) = subtasks.get_mut(index) else {
            return Err(PlannerError::Validation(format!(
                "subtask index {index} out of range (task has {count})"
            )));
        };
        item.done = !item.done;
        self.set_subtasks(id, &subtasks)
    }

    /// Append a link line to the Attachments section.
    pub fn link_attachment(&self, id: &str, attachment: &AttachmentRef) -> Result<Task> {
        self.edit_task(id, |task, _| {
            let mut lines: Vec<String> = task
                .body
                .section(&SectionName::Attachments)
                .map(|s| s.lines().map(str::to_string).collect())
                .unwrap_or_default();
            lines.push(format!("- [{}]({})", attachment.name, attachment.link));
            task.body
                .set_section(SectionName::Attachments, &lines.join("\n"), TASK_SECTIONS);
            Ok(())
        })
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut areas = vec![Area::Active];
        if filter.include_archived {
            areas.push(Area::Archive);
        }
        let mut tasks = Vec::new();
        for area in areas {
            let projects = match filter.project.as_deref() {
                Some(project) => vec![component(project)?.to_string()],
                None => self.project_dirs(area)?,
            };
            for project in projects {
                for task in self.read_project_tasks(area, &project)? {
                    if filter.matches(&task.meta) {
                        tasks.push(task);
                    }
                }
            }
        }
        Ok(tasks)
    }

    /// Every readable task in both trees, tagged with the tree it came from.
    pub fn list_all(&self) -> Result<Vec<(Area, Task)>> {
        let mut all = Vec::new();
        for area in [Area::Active, Area::Archive] {
            for project in self.project_dirs(area)? {
                for task in self.read_project_tasks(area, &project)? {
                    all.push((area, task));
                }
            }
        }
        Ok(all)
    }

    /// Parse one project's task files, skipping the ones that do not parse.
    fn read_project_tasks(&self, area: Area, project: &str) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        for path in self.task_files(area, project)? {
            match self.read_task_file(&path) {
                Ok(task) => tasks.push(task),
                // A file can vanish between listing and reading when a move lands.
                Err(PlannerError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping malformed task file");
                }
            }
        }
        Ok(tasks)
    }

    /// Copy `source` into the project's attachments directory.
    pub fn add_attachment(
        &self,
        project: &str,
        source: &Path,
        new_name: Option<&str>,
    ) -> Result<AttachmentRef> {
        self.require_active_project(project)?;
        if !source.is_file() {
            return Err(PlannerError::AttachmentNotFound(source.display().to_string()));
        }
        let name = match new_name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let name = component(&name)?.to_string();
        let dest = self
            .ws
            .resolve([PROJECTS_DIR, project, ATTACHMENTS_DIR, name.as_str()])?;

        let bytes = fs::read(source)?;
        write_atomic(&dest, &bytes)?;
        info!(project = %project, attachment = %name, "added attachment");
        Ok(AttachmentRef {
            path: self.ws.relative(&dest),
            link: format!("../{ATTACHMENTS_DIR}/{name}"),
            name,
        })
    }

    /// Resolve an attachment for reading. Traversal and missing files are both not-found.
    pub fn attachment_path(&self, project: &str, filename: &str) -> Result<PathBuf> {
        let not_found = || PlannerError::AttachmentNotFound(format!("{project}/{filename}"));
        let (project, filename) = match (component(project), component(filename)) {
            (Ok(p), Ok(f)) => (p, f),
            _ => return Err(not_found()),
        };
        for area in [Area::Active, Area::Archive] {
            match self.ws.resolve([area.dir(), project, ATTACHMENTS_DIR, filename]) {
                Ok(path) if path.is_file() => return Ok(path),
                Ok(_) => {}
                Err(_) => return Err(not_found()),
            }
        }
        Err(not_found())
    }

    /// Cheap change detector over every document (path, size, mtime).
    pub fn fingerprint(&self) -> Result<String> {
        let mut entries = Vec::new();
        for area in [Area::Active, Area::Archive] {
            for project in self.project_dirs(area)? {
                let readme = self.ws.resolve([area.dir(), project.as_str(), README])?;
                let mut files = self.task_files(area, &project)?;
                if readme.is_file() {
                    files.push(readme);
                }
                for path in files {
                    let Ok(meta) = fs::metadata(&path) else {
                        continue;
                    };
                    let mtime = meta
                        .modified()?
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_nanos();
                    entries.push((self.ws.relative(&path), meta.len(), mtime));
                }
            }
        }
        entries.sort();
        Ok(entries
            .iter()
            .map(|(path, size, mtime)| format!("{path}:{size}:{mtime}"))
            .collect::<Vec<_>>()
            .join(","))
    }
}

fn normalize_tags(tags: &mut Vec<String>) {
    for tag in tags.iter_mut() {
        *tag = tag.trim().to_string();
    }
    tags.retain(|t| !t.is_empty());
    tags.sort();
    tags.dedup();
}

fn validate_colour(colour: &str) -> Result<()> {
    let hex = colour.strip_prefix('#').unwrap_or_default();
    if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(PlannerError::Validation(format!("colour '{colour}' (expected #rgb or #rrggbb)")))
    }
}

fn sync_status_from_subtasks(task: &mut Task) {
    let subtasks = task.body.subtasks();
    let total = subtasks.len();
    let done = subtasks.iter().filter(|s| s.done).count();
    if total == 0 {
        return;
    }
    if done == total {
        task.meta.status = Status::Done;
    } else if done > 0 && task.meta.status == Status::Todo {
        task.meta.status = Status::InProgress;
    }
}

/// First file under `src` that already exists at the mirrored path under `dst`.
fn first_merge_conflict(src: &Path, dst: &Path) -> Result<Option<PathBuf>> {
    if !dst.exists() {
        return Ok(None);
    }
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            if let Some(conflict) = first_merge_conflict(&entry.path(), &target)? {
                return Ok(Some(conflict));
            }
        } else if target.exists() {
            return Ok(Some(target));
        }
    }
    Ok(None)
}

/// Move a directory tree, merging into `dst` when it already exists.
/// Every step is a single rename, so each file is always whole in one place.
fn relocate_dir(src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(src, dst)?;
        return Ok(());
    }
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            relocate_dir(&entry.path(), &target)?;
        } else {
            fs::rename(entry.path(), &target)?;
        }
    }
    fs::remove_dir(src)?;
    Ok(())
}
