use std::path::Path;

use chrono::Utc;
use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn move_task(root: &Path, id: &str, project: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.move_task(id, project)?;
    output::print_task(&task, format)
}

pub fn link(root: &Path, id: &str, depends_on: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.link_tasks(id, depends_on)?;
    output::print_task(&task, format)
}

pub fn archive(root: &Path, id: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.archive_task(id)?;
    output::print_task(&task, format)
}

pub fn checkin(root: &Path, id: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.check_in(id)?;
    output::print_task(&task, format)
}

pub fn auto_archive(root: &Path, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let archived = planner.auto_archive_completed(Utc::now())?;
    match format {
        Format::Json => output::print_json(&json!({ "archived": archived }))?,
        Format::Pretty => {
            if archived.is_empty() {
                println!("{}", "Nothing to archive.".dimmed());
            }
            for id in &archived {
                println!("archived {}", id.cyan());
            }
        }
    }
    Ok(())
}
