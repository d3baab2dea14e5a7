use std::path::Path;

use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

/// Copy a file into a project. With `task`, also link it from that task's body.
pub fn run(
    root: &Path,
    target: AttachTarget<'_>,
    source: &Path,
    name: Option<&str>,
    format: Format,
) -> Result<()> {
    let planner = Planner::open(root)?;
    let (task, attachment) = match target {
        AttachTarget::Task(id) => {
            let (task, attachment) = planner.attach_to_task(id, source, name)?;
            (Some(task), attachment)
        }
        AttachTarget::Project(id) => (None, planner.add_attachment(id, source, name)?),
    };

    match format {
        Format::Json => output::print_json(&json!({
            "attachment": attachment,
            "task": task.as_ref().map(output::task_summary),
        }))?,
        Format::Pretty => {
            println!("{} {}", "stored:".dimmed(), attachment.path);
            println!("{} {}", "link:".dimmed(), attachment.link);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub enum AttachTarget<'a> {
    Task(&'a str),
    Project(&'a str),
}
