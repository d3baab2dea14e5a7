use std::path::Path;

use chrono::Local;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn show(root: &Path, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    output::print_today(&planner.today(Local::now().date_naive())?, format)
}

pub fn set(root: &Path, task_ids: &[String], format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    for id in task_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        planner.get_task(id)?;
    }
    output::print_today(&planner.set_today(Local::now().date_naive(), task_ids)?, format)
}
