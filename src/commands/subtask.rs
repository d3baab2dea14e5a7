use std::path::Path;

use crate::body::Subtask;
use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

fn print(subtasks: &[Subtask], format: Format) -> Result<()> {
    match format {
        Format::Json => output::print_json(&subtasks)?,
        Format::Pretty => {
            for (n, subtask) in subtasks.iter().enumerate() {
                let mark = if subtask.done { "x" } else { " " };
                println!("{:>3} [{}] {}", n, mark, subtask.title);
            }
        }
    }
    Ok(())
}

pub fn list(root: &Path, id: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    print(&planner.subtasks(id)?, format)
}

pub fn add(root: &Path, id: &str, titles: &[String], format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.add_subtasks(id, titles)?;
    print(&task.subtasks(), format)
}

pub fn toggle(root: &Path, id: &str, index: usize, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.toggle_subtask(id, index)?;
    output::print_task(&task, format)
}
