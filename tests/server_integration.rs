use std::fs;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tempfile::tempdir;

use nlplanner::config::Config;
use nlplanner::model::NewTask;
use nlplanner::server::{DashboardServer, SERVICE_NAME};
use nlplanner::store::repo::Planner;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn workspace() -> (tempfile::TempDir, Arc<Planner>) {
    let dir = tempdir().unwrap();
    Planner::init(dir.path()).unwrap();
    let mut config = Config::load(dir.path()).unwrap();
    config.dashboard_port = free_port();
    config.save(dir.path()).unwrap();
    let planner = Arc::new(Planner::open(dir.path()).unwrap());
    (dir, planner)
}

fn status_of(url: &str) -> u16 {
    match ureq::get(url).call() {
        Ok(response) => response.status(),
        Err(ureq::Error::Status(code, _)) => code,
        Err(err) => panic!("request to {url} failed: {err}"),
    }
}

#[test]
fn dashboard_serves_workspace_over_http() {
    let (_dir, planner) = workspace();
    planner
        .create_task(NewTask {
            title: "Redesign homepage".into(),
            ..NewTask::default()
        })
        .unwrap();

    let server = DashboardServer::new(Arc::clone(&planner));
    let info = server.ensure_running().unwrap();

    let health: Value = ureq::get(&format!("{}/api/health", info.url))
        .call()
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(health["service"], SERVICE_NAME);

    let tasks: Value = ureq::get(&format!("{}/api/tasks", info.url))
        .call()
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(tasks[0]["id"], "task-001");

    let pinned: Value = ureq::post(&format!("{}/api/today", info.url))
        .send_json(json!({ "task_ids": ["task-001"] }))
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(pinned["task_ids"], json!(["task-001"]));

    server.stop();
}

#[test]
fn tasks_written_after_start_are_visible() {
    let (_dir, planner) = workspace();
    let server = DashboardServer::new(Arc::clone(&planner));
    let info = server.ensure_running().unwrap();

    planner
        .create_task(NewTask {
            title: "Late arrival".into(),
            ..NewTask::default()
        })
        .unwrap();
    let task: Value = ureq::get(&format!("{}/api/task/task-001", info.url))
        .call()
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(task["title"], "Late arrival");
}

#[test]
fn attachment_traversal_is_not_found_over_the_wire() {
    let (dir, planner) = workspace();
    fs::write(dir.path().join("secret.txt"), "nope").unwrap();
    let server = DashboardServer::new(planner);
    let info = server.ensure_running().unwrap();

    for path in [
        "/api/attachment/inbox/..%2F..%2Fsecret.txt",
        "/api/attachment/..%2F..%2F.config/config.json",
        "/api/attachment/inbox/%2E%2E",
    ] {
        assert_eq!(status_of(&format!("{}{}", info.url, path)), 404, "{path}");
    }
}

#[test]
fn second_server_for_same_workspace_reuses_the_first() {
    let (_dir, planner) = workspace();
    let first = DashboardServer::new(Arc::clone(&planner));
    let running = first.ensure_running().unwrap();

    let second = DashboardServer::new(planner);
    let reused = second.ensure_running().unwrap();
    assert_eq!(reused.port, running.port);
    assert!(reused.external);
    assert!(!second.is_running());
}

#[test]
fn stop_releases_the_port() {
    let (_dir, planner) = workspace();
    let server = DashboardServer::new(planner);
    let info = server.ensure_running().unwrap();
    server.stop();
    assert!(!server.is_running());

    // the accept thread drops its socket shortly after the workers exit
    let deadline = Instant::now() + Duration::from_secs(5);
    while TcpListener::bind(("127.0.0.1", info.port)).is_err() {
        assert!(Instant::now() < deadline, "port {} still bound", info.port);
        thread::sleep(Duration::from_millis(50));
    }
}
