use std::fs;

use chrono::{Duration, Local, NaiveDate};
use tempfile::tempdir;

use nlplanner::error::PlannerError;
use nlplanner::model::{NewProject, NewTask, Priority, Status, TaskFilter, TaskUpdate};
use nlplanner::store::repo::Planner;
use nlplanner::workspace::Workspace;

#[test]
fn test_full_workflow() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();

    let project = planner
        .create_project(NewProject {
            name: "Website Redesign".into(),
            tags: vec!["design".into()],
            ..NewProject::default()
        })
        .unwrap();
    assert_eq!(project.id(), "website-redesign");

    let task = planner
        .create_task(NewTask {
            title: "Redesign homepage".into(),
            project: Some("website-redesign".into()),
            priority: Some(Priority::High),
            due: NaiveDate::from_ymd_opt(2026, 2, 13),
            ..NewTask::default()
        })
        .unwrap();

    let listed = planner
        .list_tasks(&TaskFilter {
            project: Some("website-redesign".into()),
            ..TaskFilter::default()
        })
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].meta.priority, Priority::High);
    assert_eq!(listed[0].meta.due, NaiveDate::from_ymd_opt(2026, 2, 13));

    planner.archive_task(task.id()).unwrap();
    assert!(planner.list_tasks(&TaskFilter::default()).unwrap().is_empty());

    let everything = planner
        .list_tasks(&TaskFilter {
            include_archived: true,
            ..TaskFilter::default()
        })
        .unwrap();
    assert_eq!(everything.len(), 1);
    assert_eq!(everything[0].meta.status, Status::Archived);
}

#[test]
fn create_then_get_returns_supplied_fields_and_config_defaults() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    let created = planner
        .create_task(NewTask {
            title: "Write launch post".into(),
            description: Some("Draft for the blog".into()),
            tags: vec!["launch".into(), "writing".into()],
            ..NewTask::default()
        })
        .unwrap();

    let read = planner.get_task(created.id()).unwrap();
    assert_eq!(read, created);
    assert_eq!(read.meta.title, "Write launch post");
    assert_eq!(read.description(), Some("Draft for the blog"));
    assert_eq!(read.meta.tags, vec!["launch", "writing"]);
    assert_eq!(read.meta.priority, planner.config().default_priority);
    assert_eq!(read.meta.status, Status::Todo);
    assert_eq!(read.meta.project, None);
}

#[test]
fn status_update_leaves_human_edits_alone() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    let task = planner
        .create_task(NewTask {
            title: "Homepage".into(),
            tags: vec!["design".into()],
            ..NewTask::default()
        })
        .unwrap();

    let path = dir.path().join("projects/inbox/tasks/task-001.md");
    let original = fs::read_to_string(&path).unwrap();
    let hand_edited = original.replace(
        "## Context\n",
        "## Context\nClient wants it *bold*.\n\n| a | b |\n|---|---|\n",
    ) + "\n## Scratch\nmy own section\n";
    fs::write(&path, &hand_edited).unwrap();

    let updated = planner
        .update_task(
            task.id(),
            TaskUpdate {
                status: Some(Status::Done),
                ..TaskUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.meta.status, Status::Done);
    assert_eq!(updated.meta.title, task.meta.title);
    assert_eq!(updated.meta.tags, task.meta.tags);
    assert_eq!(updated.meta.priority, task.meta.priority);
    assert_eq!(updated.meta.created, task.meta.created);

    let after = fs::read_to_string(&path).unwrap();
    let body_of = |raw: &str| raw.split_once("\n---\n").unwrap().1.to_string();
    assert_eq!(body_of(&after), body_of(&hand_edited));
}

#[test]
fn overdue_tracks_due_date_and_status() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    let today = Local::now().date_naive();
    let task = planner
        .create_task(NewTask {
            title: "File taxes".into(),
            due: Some(today - Duration::days(1)),
            ..NewTask::default()
        })
        .unwrap();

    let overdue = planner.overdue(today).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id(), task.id());

    planner
        .update_task(
            task.id(),
            TaskUpdate {
                status: Some(Status::Done),
                ..TaskUpdate::default()
            },
        )
        .unwrap();
    assert!(planner.overdue(today).unwrap().is_empty());
}

#[test]
fn search_puts_title_match_before_tag_match() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    planner
        .create_task(NewTask {
            title: "Collect assets".into(),
            tags: vec!["homepage".into()],
            ..NewTask::default()
        })
        .unwrap();
    planner
        .create_task(NewTask {
            title: "Redesign Homepage".into(),
            ..NewTask::default()
        })
        .unwrap();

    let hits = planner.search("homepage").unwrap();
    let ids: Vec<&str> = hits.iter().map(|(t, _)| t.id()).collect();
    assert_eq!(ids, vec!["task-002", "task-001"]);
}

#[test]
fn ids_are_not_reused_after_archive() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    for title in ["a", "b", "c"] {
        planner
            .create_task(NewTask {
                title: title.into(),
                ..NewTask::default()
            })
            .unwrap();
    }
    planner.archive_task("task-003").unwrap();
    let next = planner
        .create_task(NewTask {
            title: "d".into(),
            ..NewTask::default()
        })
        .unwrap();
    assert_eq!(next.id(), "task-004");
}

#[test]
fn escaping_paths_fail_wherever_the_workspace_lives() {
    let outer = tempdir().unwrap();
    for depth in 0..4 {
        let mut root = outer.path().to_path_buf();
        for n in 0..depth {
            root.push(format!("level{n}"));
        }
        fs::create_dir_all(&root).unwrap();
        let ws = Workspace::new(&root).unwrap();

        for attempt in ["..", "../..", "projects/../../x", "a/b/../../../c"] {
            assert!(
                matches!(ws.resolve([attempt]), Err(PlannerError::PathEscape(_))),
                "depth {depth}: {attempt}"
            );
        }
        assert!(ws.resolve(["projects/inbox/../inbox/tasks"]).is_ok());
    }
}

#[test]
fn rejected_update_writes_nothing() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    planner
        .create_task(NewTask {
            title: "Keep me".into(),
            ..NewTask::default()
        })
        .unwrap();
    let path = dir.path().join("projects/inbox/tasks/task-001.md");
    let before = fs::read_to_string(&path).unwrap();

    let err = planner
        .update_task(
            "task-001",
            TaskUpdate {
                status: Some(Status::Archived),
                ..TaskUpdate::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");

    let err = planner
        .update_task(
            "../../.config/config",
            TaskUpdate {
                title: Some("x".into()),
                ..TaskUpdate::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "path_escape");
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn today_list_from_yesterday_reads_empty() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    let today = Local::now().date_naive();
    planner
        .set_today(today - Duration::days(1), &["task-001".into()])
        .unwrap();
    assert!(planner.today(today).unwrap().task_ids.is_empty());

    planner.set_today(today, &["task-001".into()]).unwrap();
    assert_eq!(planner.today(today).unwrap().task_ids, vec!["task-001"]);
}

#[test]
fn move_then_archive_project_keeps_everything_readable() {
    let dir = tempdir().unwrap();
    let planner = Planner::init(dir.path()).unwrap();
    planner
        .create_project(NewProject {
            name: "Q3 Launch".into(),
            ..NewProject::default()
        })
        .unwrap();
    let task = planner
        .create_task(NewTask {
            title: "Press kit".into(),
            ..NewTask::default()
        })
        .unwrap();

    planner.move_task(task.id(), "q3-launch").unwrap();
    planner.archive_project("q3-launch").unwrap();

    let read = planner.get_task(task.id()).unwrap();
    assert_eq!(read.meta.project.as_deref(), Some("q3-launch"));
    assert!(dir.path().join("archive/q3-launch/tasks/task-001.md").is_file());
    assert!(matches!(
        planner.move_task(task.id(), "inbox"),
        Err(PlannerError::Validation(_))
    ));
    assert!(matches!(
        planner.create_project(NewProject {
            name: "Q3 Launch".into(),
            ..NewProject::default()
        }),
        Err(PlannerError::Validation(_))
    ));
}
