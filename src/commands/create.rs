use std::path::Path;

use crate::error::Result;
use crate::model::NewTask;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn run(root: &Path, new: NewTask, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.create_task(new)?;
    output::print_task(&task, format)
}
