//! Loopback JSON API for the dashboard.
//!
//! One `tiny_http::Server` is shared by a small pool of worker threads, so a
//! request that triggers an index rescan never stops the others from being
//! accepted. `DashboardServer` owns the listener; `ensure_running` and `stop`
//! are its only lifecycle entry points.

pub mod routes;

use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PlannerError, Result};
use crate::store::repo::Planner;

pub const SERVICE_NAME: &str = "nlplanner";

/// Ports tried after the configured one before giving up.
pub const PORT_SEARCH_SPAN: u16 = 10;
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const WORKER_THREADS: usize = 4;
const MAX_REQUEST_BODY: u64 = 1024 * 1024;

/// Where the dashboard API can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
    pub url: String,
    /// True when another process already serves this workspace.
    pub external: bool,
}

struct Listener {
    server: Arc<tiny_http::Server>,
    workers: Vec<JoinHandle<()>>,
    port: u16,
}

impl Listener {
    fn shutdown(self) {
        for _ in &self.workers {
            self.server.unblock();
        }
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("dashboard worker panicked");
            }
        }
        debug!(port = self.port, "dashboard listener stopped");
    }
}

struct State {
    listener: Option<Listener>,
    port: u16,
}

pub struct DashboardServer {
    planner: Arc<Planner>,
    host: String,
    state: Mutex<State>,
}

impl DashboardServer {
    pub fn new(planner: Arc<Planner>) -> Self {
        let config = planner.config();
        Self {
            host: config.dashboard_host.clone(),
            state: Mutex::new(State {
                listener: None,
                port: config.dashboard_port,
            }),
            planner,
        }
    }

    fn info(&self, port: u16, external: bool) -> ServerInfo {
        ServerInfo {
            host: self.host.clone(),
            port,
            url: format!("http://{}:{}", self.host, port),
            external,
        }
    }

    /// Start the listener unless a healthy one for this workspace already exists.
    ///
    /// Calls are serialized, so concurrent callers never bind twice. Order:
    /// our own listener if it answers its health probe; then a healthy
    /// nlplanner for the same workspace on the configured port; then the first
    /// port in `port..=port + PORT_SEARCH_SPAN` that binds. A port other than
    /// the configured one is written back to the workspace config.
    pub fn ensure_running(&self) -> Result<ServerInfo> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(port) = state.listener.as_ref().map(|l| l.port) {
            if self.probe(port) {
                return Ok(self.info(port, false));
            }
            warn!(port, "dashboard listener unhealthy, restarting");
            if let Some(dead) = state.listener.take() {
                dead.shutdown();
            }
        }

        let configured = state.port;
        if configured != 0 && self.probe(configured) {
            info!(port = configured, "reusing dashboard already serving this workspace");
            return Ok(self.info(configured, true));
        }

        let end = configured.saturating_add(PORT_SEARCH_SPAN);
        for candidate in configured..=end {
            let server = match tiny_http::Server::http((self.host.as_str(), candidate)) {
                Ok(server) => server,
                Err(err) => {
                    debug!(port = candidate, error = %err, "port unavailable");
                    continue;
                }
            };
            let port = server
                .server_addr()
                .to_ip()
                .map(|addr| addr.port())
                .unwrap_or(candidate);
            let listener = spawn_workers(server, port, &self.planner)?;
            state.listener = Some(listener);

            if port != configured {
                self.persist_port(port)?;
                state.port = port;
            }
            info!(host = %self.host, port, "dashboard listening");
            return Ok(self.info(port, false));
        }

        Err(PlannerError::PortUnavailable {
            start: configured,
            end,
        })
    }

    /// Release the socket and join the workers. A no-op when not running.
    pub fn stop(&self) {
        let listener = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listener
            .take();
        if let Some(listener) = listener {
            listener.shutdown();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listener
            .is_some()
    }

    fn persist_port(&self, port: u16) -> Result<()> {
        let root = self.planner.root();
        let mut config = Config::load(root)?;
        config.dashboard_port = port;
        config.save(root)
    }

    /// True when `port` answers as an nlplanner serving this workspace.
    fn probe(&self, port: u16) -> bool {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(PROBE_TIMEOUT)
            .timeout(PROBE_TIMEOUT)
            .build();
        let url = format!("http://{}:{}/api/health", self.host, port);
        let health: Value = match agent.get(&url).call() {
            Ok(response) => match response.into_json() {
                Ok(value) => value,
                Err(_) => return false,
            },
            Err(_) => return false,
        };
        health["service"] == SERVICE_NAME
            && health["workspace"] == self.planner.root().display().to_string()
    }
}

impl Drop for DashboardServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_workers(server: tiny_http::Server, port: u16, planner: &Arc<Planner>) -> Result<Listener> {
    let server = Arc::new(server);
    let mut workers = Vec::with_capacity(WORKER_THREADS);
    for n in 0..WORKER_THREADS {
        let server = Arc::clone(&server);
        let planner = Arc::clone(planner);
        let worker = thread::Builder::new()
            .name(format!("nlplanner-http-{n}"))
            .spawn(move || serve(&server, &planner))?;
        workers.push(worker);
    }
    Ok(Listener {
        server,
        workers,
        port,
    })
}

/// Worker loop; returns once `unblock` is called for this thread.
fn serve(server: &tiny_http::Server, planner: &Planner) {
    for mut request in server.incoming_requests() {
        let mut body = String::new();
        let read = request
            .as_reader()
            .take(MAX_REQUEST_BODY)
            .read_to_string(&mut body);
        if let Err(err) = read {
            debug!(error = %err, "unreadable request body");
            body.clear();
        }

        let api = routes::handle(planner, request.method(), request.url(), &body);
        let mut response = tiny_http::Response::from_data(api.body).with_status_code(api.status);
        for (name, value) in &api.headers {
            if let Ok(header) = tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                response.add_header(header);
            }
        }
        if let Err(err) = request.respond(response) {
            debug!(error = %err, "client went away before response");
        }
    }
}
