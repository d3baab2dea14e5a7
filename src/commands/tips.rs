use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

/// Show the agent tips of a task, or append (or replace) them when given.
pub fn run(root: &Path, id: &str, tips: &[String], replace: bool, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let tips = if tips.is_empty() && !replace {
        planner.agent_tips(id)?
    } else {
        planner.set_agent_tips(id, tips, replace)?.agent_tips()
    };
    match format {
        Format::Json => output::print_json(&tips)?,
        Format::Pretty => {
            for tip in &tips {
                println!("- {}", tip);
            }
        }
    }
    Ok(())
}
