use std::path::Path;

use chrono::{Local, Utc};

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn search(root: &Path, query: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    output::print_search(&planner.search(query)?, format)
}

pub fn overdue(root: &Path, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    output::print_tasks(&planner.overdue(Local::now().date_naive())?, format)
}

pub fn due_soon(root: &Path, days: i64, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    output::print_tasks(&planner.due_soon(Local::now().date_naive(), days)?, format)
}

pub fn checkins(root: &Path, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    output::print_tasks(&planner.needing_checkin(Utc::now())?, format)
}

pub fn stats(root: &Path, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let stats = planner.snapshot()?.stats(
        Local::now().date_naive(),
        Utc::now(),
        planner.config().checkin_frequency_hours,
    );
    output::print_stats(&stats, format)
}
