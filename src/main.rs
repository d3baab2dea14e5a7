use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nlplanner::commands::attach::AttachTarget;
use nlplanner::config::find_workspace_root;
use nlplanner::model::{
    NewProject, NewTask, Priority, ProjectUpdate, Status, TaskFilter, TaskUpdate, parse_due,
};
use nlplanner::output::Format;
use tracing_subscriber::EnvFilter;

const WORKSPACE_ENV: &str = "NLPLANNER_WORKSPACE";

#[derive(Parser)]
#[command(
    name = "nlplanner",
    version,
    about = "File-backed task and project planner with a local dashboard API"
)]
struct Cli {
    /// Workspace root (default: $NLPLANNER_WORKSPACE, then the nearest ancestor with .config/config.json)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace layout (safe to re-run)
    Init,
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Project id (default: inbox)
        #[arg(long)]
        project: Option<String>,
        /// Task description
        #[arg(long, short)]
        description: Option<String>,
        /// Background context
        #[arg(long)]
        context: Option<String>,
        /// Task priority (default from config)
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Initial status
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = due_arg)]
        due: Option<NaiveDate>,
        /// Percent complete (0-100); recomputed from subtasks when there are any
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: Option<u8>,
        /// Tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tag: Vec<String>,
        /// Task ids this task depends on (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends_on: Vec<String>,
        /// Note line (repeatable)
        #[arg(long)]
        note: Vec<String>,
        /// Subtask (repeatable)
        #[arg(long)]
        subtask: Vec<String>,
        /// Agent tip (repeatable)
        #[arg(long)]
        tip: Vec<String>,
    },
    /// Display a single task
    Show {
        /// Task id
        id: String,
    },
    /// List and filter tasks
    List {
        /// Filter by project id
        #[arg(long)]
        project: Option<String>,
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Filter by priority
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
        /// Include archived tasks
        #[arg(long)]
        include_archived: bool,
    },
    /// Change task fields; omitted fields stay as they are
    Update {
        /// Task id
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = due_arg, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Percent complete (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: Option<u8>,
        /// Replace tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tag: Option<Vec<String>>,
        /// Replace dependencies (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends_on: Option<Vec<String>>,
        /// Replace the Description section
        #[arg(long, short)]
        description: Option<String>,
        /// Replace the Context section
        #[arg(long)]
        context: Option<String>,
        /// Replace the Notes section
        #[arg(long)]
        notes: Option<String>,
    },
    /// Move a task to another project
    Move {
        /// Task id
        id: String,
        /// Target project id (`inbox` for none)
        project: String,
    },
    /// Record that a task depends on another
    Link {
        /// Dependent task id
        id: String,
        /// Task it depends on
        depends_on: String,
    },
    /// Archive a task
    Archive {
        /// Task id
        id: String,
    },
    /// Copy a file into a project's attachments and link it from a task
    Attach {
        /// Task id (or project id with --project)
        target: String,
        /// File to copy
        file: PathBuf,
        /// Stored file name (default: source file name)
        #[arg(long)]
        name: Option<String>,
        /// Treat TARGET as a project id and skip linking
        #[arg(long)]
        project: bool,
    },
    /// Record a check-in on a task
    Checkin {
        /// Task id
        id: String,
    },
    /// Show or add agent tips for a task
    Tips {
        /// Task id
        id: String,
        /// Tips to add
        tips: Vec<String>,
        /// Replace existing tips instead of appending
        #[arg(long)]
        replace: bool,
    },
    /// Work with a task's checklist
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },
    /// Search titles, tags and descriptions
    Search {
        /// Query words
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Open tasks past their due date
    Overdue,
    /// Open tasks due within N days
    DueSoon {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Open tasks that have not been checked in on recently
    Checkins,
    /// Task and project counts
    Stats,
    /// Pinned task list for today
    Today {
        #[command(subcommand)]
        action: TodayAction,
    },
    /// Archive done tasks older than the configured number of days
    AutoArchive,
    /// Run the dashboard API in the foreground
    Serve,
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project (returns the existing one if the id is taken)
    Create {
        /// Project name; the id is its slug
        name: String,
        #[arg(long, short)]
        description: Option<String>,
        /// Tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tag: Vec<String>,
        /// Goal (repeatable)
        #[arg(long)]
        goal: Vec<String>,
        /// Accent colour (#rrggbb)
        #[arg(long)]
        color: Option<String>,
    },
    /// List projects
    List {
        #[arg(long)]
        include_archived: bool,
    },
    /// Show one project
    Show { id: String },
    /// Change project fields
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        /// Replace tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tag: Option<Vec<String>>,
        /// Replace goals (repeatable)
        #[arg(long)]
        goal: Option<Vec<String>>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Archive a project and everything in it
    Archive { id: String },
}

#[derive(Subcommand)]
enum SubtaskAction {
    /// List subtasks with their indexes
    List { id: String },
    /// Append subtasks
    Add {
        id: String,
        #[arg(required = true)]
        titles: Vec<String>,
    },
    /// Flip one subtask by index
    Toggle { id: String, index: usize },
}

#[derive(Subcommand)]
enum TodayAction {
    /// Show today's pinned tasks
    Show,
    /// Replace today's pinned tasks
    Set { task_ids: Vec<String> },
}

fn due_arg(input: &str) -> Result<NaiveDate, String> {
    parse_due(input).map_err(|e| e.to_string())
}

/// Explicit flag, then the environment, then the nearest initialised ancestor.
fn workspace_root(flag: Option<PathBuf>) -> nlplanner::error::Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root);
    }
    if let Some(root) = std::env::var_os(WORKSPACE_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    find_workspace_root(&std::env::current_dir()?)
}

fn run(cli: Cli, format: Format) -> nlplanner::error::Result<()> {
    use nlplanner::commands;

    let root = match cli.command {
        // init creates the workspace, so there is nothing to search upward for
        Commands::Init => match cli.workspace {
            Some(root) => root,
            None => match std::env::var_os(WORKSPACE_ENV).filter(|v| !v.is_empty()) {
                Some(root) => PathBuf::from(root),
                None => std::env::current_dir()?,
            },
        },
        _ => workspace_root(cli.workspace)?,
    };
    let root: &Path = &root;

    match cli.command {
        Commands::Init => commands::init::run(root, format),
        Commands::Project { action } => match action {
            ProjectAction::Create {
                name,
                description,
                tag,
                goal,
                color,
            } => commands::project::create(
                root,
                NewProject {
                    name,
                    description,
                    tags: tag,
                    goals: goal,
                    color,
                },
                format,
            ),
            ProjectAction::List { include_archived } => {
                commands::project::list(root, include_archived, format)
            }
            ProjectAction::Show { id } => commands::project::show(root, &id, format),
            ProjectAction::Update {
                id,
                title,
                description,
                tag,
                goal,
                color,
            } => commands::project::update(
                root,
                &id,
                ProjectUpdate {
                    title,
                    tags: tag,
                    color,
                    description,
                    goals: goal,
                },
                format,
            ),
            ProjectAction::Archive { id } => commands::project::archive(root, &id, format),
        },
        Commands::Create {
            title,
            project,
            description,
            context,
            priority,
            status,
            due,
            progress,
            tag,
            depends_on,
            note,
            subtask,
            tip,
        } => commands::create::run(
            root,
            NewTask {
                title,
                project,
                description,
                context,
                priority,
                status,
                due,
                progress,
                tags: tag,
                dependencies: depends_on,
                notes: note,
                subtasks: subtask,
                agent_tips: tip,
            },
            format,
        ),
        Commands::Show { id } => commands::show::run(root, &id, format),
        Commands::List {
            project,
            status,
            priority,
            tag,
            include_archived,
        } => commands::list::run(
            root,
            TaskFilter {
                project,
                status,
                priority,
                tag,
                include_archived,
            },
            format,
        ),
        Commands::Update {
            id,
            title,
            status,
            priority,
            due,
            clear_due,
            progress,
            tag,
            depends_on,
            description,
            context,
            notes,
        } => commands::edit::run(
            root,
            &id,
            TaskUpdate {
                title,
                status,
                priority,
                due: if clear_due { Some(None) } else { due.map(Some) },
                progress,
                tags: tag,
                dependencies: depends_on,
                last_checkin: None,
                description,
                context,
                notes,
            },
            format,
        ),
        Commands::Move { id, project } => commands::lifecycle::move_task(root, &id, &project, format),
        Commands::Link { id, depends_on } => {
            commands::lifecycle::link(root, &id, &depends_on, format)
        }
        Commands::Archive { id } => commands::lifecycle::archive(root, &id, format),
        Commands::Attach {
            target,
            file,
            name,
            project,
        } => {
            let target = if project {
                AttachTarget::Project(&target)
            } else {
                AttachTarget::Task(&target)
            };
            commands::attach::run(root, target, &file, name.as_deref(), format)
        }
        Commands::Checkin { id } => commands::lifecycle::checkin(root, &id, format),
        Commands::Tips { id, tips, replace } => {
            commands::tips::run(root, &id, &tips, replace, format)
        }
        Commands::Subtask { action } => match action {
            SubtaskAction::List { id } => commands::subtask::list(root, &id, format),
            SubtaskAction::Add { id, titles } => commands::subtask::add(root, &id, &titles, format),
            SubtaskAction::Toggle { id, index } => {
                commands::subtask::toggle(root, &id, index, format)
            }
        },
        Commands::Search { query } => commands::query::search(root, &query.join(" "), format),
        Commands::Overdue => commands::query::overdue(root, format),
        Commands::DueSoon { days } => commands::query::due_soon(root, days, format),
        Commands::Checkins => commands::query::checkins(root, format),
        Commands::Stats => commands::query::stats(root, format),
        Commands::Today { action } => match action {
            TodayAction::Show => commands::today::show(root, format),
            TodayAction::Set { task_ids } => commands::today::set(root, &task_ids, format),
        },
        Commands::AutoArchive => commands::lifecycle::auto_archive(root, format),
        Commands::Serve => commands::serve::run(root, format),
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            Format::Pretty => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
