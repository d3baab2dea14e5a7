use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use colored::Colorize;

use crate::error::Result;
use crate::output::{self, Format};
use crate::server::DashboardServer;
use crate::store::repo::Planner;

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);

/// Run the dashboard API in the foreground. Returns at once when another
/// process already serves this workspace.
pub fn run(root: &Path, format: Format) -> Result<()> {
    let planner = Arc::new(Planner::open(root)?);
    let server = DashboardServer::new(planner);
    let info = server.ensure_running()?;
    match format {
        Format::Json => output::print_json(&info)?,
        Format::Pretty => {
            let note = if info.external { " (already running)" } else { "" };
            println!("{} {}{}", "dashboard:".dimmed(), info.url.cyan().bold(), note);
        }
    }
    if info.external {
        return Ok(());
    }
    loop {
        thread::sleep(WATCHDOG_INTERVAL);
        server.ensure_running()?;
    }
}
