use std::path::Path;

use crate::error::{PlannerError, Result};
use crate::model::TaskUpdate;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn run(root: &Path, id: &str, update: TaskUpdate, format: Format) -> Result<()> {
    if is_empty(&update) {
        return Err(PlannerError::Validation("nothing to update".into()));
    }
    let planner = Planner::open(root)?;
    let task = planner.update_task(id, update)?;
    output::print_task(&task, format)
}

fn is_empty(update: &TaskUpdate) -> bool {
    update.title.is_none()
        && update.status.is_none()
        && update.priority.is_none()
        && update.due.is_none()
        && update.progress.is_none()
        && update.tags.is_none()
        && update.dependencies.is_none()
        && update.last_checkin.is_none()
        && !update.touches_body()
}
