use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn run(root: &Path, id: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let task = planner.get_task(id)?;
    output::print_task(&task, format)
}
