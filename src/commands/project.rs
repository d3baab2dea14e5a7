use std::path::Path;

use crate::error::Result;
use crate::model::{NewProject, ProjectUpdate};
use crate::output::{self, Format};
use crate::store::repo::Planner;

pub fn create(root: &Path, new: NewProject, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let project = planner.create_project(new)?;
    output::print_project(&project, format)
}

pub fn list(root: &Path, include_archived: bool, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let projects = planner.list_projects(include_archived)?;
    output::print_projects(&projects, format)
}

pub fn show(root: &Path, id: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let project = planner.get_project(id)?;
    output::print_project(&project, format)
}

pub fn update(root: &Path, id: &str, update: ProjectUpdate, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let project = planner.update_project(id, update)?;
    output::print_project(&project, format)
}

pub fn archive(root: &Path, id: &str, format: Format) -> Result<()> {
    let planner = Planner::open(root)?;
    let project = planner.archive_project(id)?;
    output::print_project(&project, format)
}
