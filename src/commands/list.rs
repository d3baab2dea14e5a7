use std::path::Path;

use crate::error::Result;
use crate::model::TaskFilter;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn run(root: &Path, filter: TaskFilter, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let tasks = planner.list_tasks(&filter)?;
    output::print_tasks(&tasks, format)
}
