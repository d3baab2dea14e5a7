use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::model::{Priority, Project, Status, Task};
use crate::store::index::{MatchKind, Stats};
use crate::store::today::TodayFocus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
}

/// Frontmatter fields plus the description; used for list payloads.
pub fn task_summary(task: &Task) -> Value {
    let mut value = serde_json::to_value(&task.meta).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert(
            "description".into(),
            json!(task.description().unwrap_or_default()),
        );
    }
    value
}

/// Everything a detail view needs: metadata, raw body and parsed sections.
pub fn task_detail(task: &Task) -> Value {
    let mut value = task_summary(task);
    if let Value::Object(map) = &mut value {
        map.insert("body".into(), json!(task.body.render()));
        map.insert("sections".into(), json!(task.body.sections()));
        map.insert("subtasks".into(), json!(task.subtasks()));
        map.insert("agent_tips".into(), json!(task.agent_tips()));
        map.insert("attachments".into(), json!(task.body.attachments()));
    }
    value
}

pub fn project_summary(project: &Project) -> Value {
    let mut value = serde_json::to_value(&project.meta).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("description".into(), json!(project.description()));
        map.insert("goals".into(), json!(project.goals()));
    }
    value
}

pub fn search_hit(task: &Task, matched: MatchKind) -> Value {
    let mut value = task_summary(task);
    if let Value::Object(map) = &mut value {
        map.insert("match".into(), json!(matched));
    }
    value
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn status_label(status: Status) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        Status::Todo => label.normal(),
        Status::InProgress => label.yellow(),
        Status::Done => label.green(),
        Status::Archived => label.dimmed(),
    }
}

fn priority_label(priority: Priority) -> colored::ColoredString {
    let label = priority.to_string();
    match priority {
        Priority::High => label.red().bold(),
        Priority::Medium => label.normal(),
        Priority::Low => label.dimmed(),
    }
}

pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() > max_len {
        let truncated: String = title.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}

pub fn print_task(task: &Task, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(&task_detail(task))?,
        Format::Pretty => {
            let meta = &task.meta;
            println!(
                "{} {} ({}, {})",
                format!("[{}]", meta.id).cyan().bold(),
                meta.title,
                status_label(meta.status),
                priority_label(meta.priority)
            );
            println!("  {} {}", "project:".dimmed(), meta.project_dir());
            if let Some(due) = meta.due {
                println!("  {} {}", "due:".dimmed(), due);
            }
            if !meta.tags.is_empty() {
                println!("  {} {}", "tags:".dimmed(), meta.tags.join(", "));
            }
            if !meta.dependencies.is_empty() {
                println!("  {} {}", "depends on:".dimmed(), meta.dependencies.join(", "));
            }
            if meta.subtask_count > 0 {
                println!(
                    "  {} {}/{}",
                    "subtasks:".dimmed(),
                    meta.subtask_done,
                    meta.subtask_count
                );
            }
            if meta.progress > 0 {
                println!("  {} {}%", "progress:".dimmed(), meta.progress);
            }
            if let Some(description) = task.description() {
                println!();
                for line in description.lines() {
                    println!("  {}", line);
                }
            }
        }
    }
    Ok(())
}

pub fn print_tasks(tasks: &[Task], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let list: Vec<Value> = tasks.iter().map(task_summary).collect();
            print_json(&list)?;
        }
        Format::Pretty => {
            if tasks.is_empty() {
                println!("{}", "No tasks.".dimmed());
            }
            for task in tasks {
                let meta = &task.meta;
                let due = meta.due.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{:9} {:32} {:12} {:7} {:10} {}",
                    meta.id,
                    truncate_title(&meta.title, 32),
                    status_label(meta.status),
                    priority_label(meta.priority),
                    due,
                    meta.project_dir().dimmed()
                );
            }
        }
    }
    Ok(())
}

pub fn print_search(hits: &[(Task, MatchKind)], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let list: Vec<Value> = hits.iter().map(|(t, m)| search_hit(t, *m)).collect();
            print_json(&list)?;
        }
        Format::Pretty => {
            if hits.is_empty() {
                println!("{}", "No matches.".dimmed());
            }
            for (task, matched) in hits {
                println!(
                    "{:9} {:40} {}",
                    task.meta.id,
                    truncate_title(&task.meta.title, 40),
                    format!("({})", matched.as_str()).dimmed()
                );
            }
        }
    }
    Ok(())
}

pub fn print_project(project: &Project, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(&project_summary(project))?,
        Format::Pretty => {
            let meta = &project.meta;
            println!(
                "{} {} ({})",
                format!("[{}]", meta.id).cyan().bold(),
                meta.title,
                meta.status
            );
            if !meta.tags.is_empty() {
                println!("  {} {}", "tags:".dimmed(), meta.tags.join(", "));
            }
            let description = project.description();
            if !description.is_empty() {
                println!("  {} {}", "description:".dimmed(), description);
            }
            for goal in project.goals() {
                println!("  {} {}", "goal:".dimmed(), goal);
            }
        }
    }
    Ok(())
}

pub fn print_projects(projects: &[Project], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let list: Vec<Value> = projects.iter().map(project_summary).collect();
            print_json(&list)?;
        }
        Format::Pretty => {
            for project in projects {
                println!(
                    "{:24} {:32} {}",
                    project.meta.id,
                    truncate_title(&project.meta.title, 32),
                    project.meta.status.to_string().dimmed()
                );
            }
        }
    }
    Ok(())
}

pub fn print_stats(stats: &Stats, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(stats)?,
        Format::Pretty => {
            println!("{} {}", "tasks:".dimmed(), stats.total_tasks.to_string().bold());
            for (status, count) in &stats.by_status {
                println!("  {:12} {}", status, count);
            }
            for (priority, count) in &stats.by_priority {
                println!("  {:12} {}", priority, count);
            }
            println!("{} {}", "projects:".dimmed(), stats.projects);
            println!("{} {}", "archived:".dimmed(), stats.archived_tasks);
            println!("{} {}", "overdue:".dimmed(), stats.overdue.to_string().red());
            println!("{} {}", "due soon:".dimmed(), stats.due_soon);
            println!("{} {}", "need check-in:".dimmed(), stats.needing_checkin);
            if !stats.tag_projects.is_empty() {
                println!("{}", "tags:".dimmed());
                for (tag, projects) in &stats.tag_projects {
                    let projects: Vec<&str> = projects.iter().map(String::as_str).collect();
                    println!("  {:12} {}", tag, projects.join(", "));
                }
            }
        }
    }
    Ok(())
}

pub fn print_today(focus: &TodayFocus, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(focus)?,
        Format::Pretty => {
            if focus.task_ids.is_empty() {
                println!("{}", "Nothing pinned for today.".dimmed());
            }
            for id in &focus.task_ids {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, TASK_SECTIONS};
    use crate::model::TaskMeta;
    use chrono::Utc;

    #[test]
    fn truncate_title_respects_char_boundaries() {
        assert_eq!(truncate_title("short", 12), "short");
        assert_eq!(truncate_title("ééééééééééééééé", 8), "ééééé...");
    }

    #[test]
    fn detail_carries_body_and_sections() {
        let now = Utc::now();
        let task = Task {
            meta: TaskMeta {
                id: "task-001".into(),
                title: "Homepage".into(),
                status: Status::Todo,
                priority: Priority::High,
                project: None,
                due: None,
                created: now,
                updated: now,
                last_checkin: None,
                tags: vec![],
                dependencies: vec![],
                progress: 40,
                subtask_count: 0,
                subtask_done: 0,
                thumbnail: None,
                extensions: Default::default(),
            },
            body: Body::scaffold(TASK_SECTIONS),
        };
        let detail = task_detail(&task);
        assert_eq!(detail["id"], "task-001");
        assert_eq!(detail["priority"], "high");
        assert_eq!(detail["progress"], 40);
        assert_eq!(detail["sections"].as_array().unwrap().len(), 6);
        assert!(detail["body"].as_str().unwrap().starts_with("## Description"));
    }
}
