use std::path::Path;

use serde_json::json;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn run(root: &Path, format: Format) -> Result<()> {
    let planner = Planner::init(root)?;
    match format {
        Format::Json => output::print_json(&json!({
            "workspace": planner.root().display().to_string(),
            "config": planner.config(),
        }))?,
        Format::Pretty => eprintln!("Initialized nlplanner workspace in {}", planner.root().display()),
    }
    Ok(())
}
