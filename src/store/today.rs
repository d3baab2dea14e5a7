use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CONFIG_DIR;
use crate::error::Result;
use crate::store::atomic::write_atomic;

pub const TODAY_FILE: &str = "today.json";

/// Task ids pinned for one calendar day. Kept out of task frontmatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayFocus {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

pub struct TodayStore {
    path: PathBuf,
}

impl TodayStore {
    pub fn open(root: &Path) -> Self {
        Self {
            path: root.join(CONFIG_DIR).join(TODAY_FILE),
        }
    }

    /// Pinned ids for `today`. A list saved on another date reads as empty,
    /// and so does an unreadable file.
    pub fn get(&self, today: NaiveDate) -> Result<TodayFocus> {
        let empty = TodayFocus {
            date: Some(today),
            task_ids: vec![],
        };
        if !self.path.is_file() {
            return Ok(empty);
        }
        let raw = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<TodayFocus>(&raw) {
            Ok(focus) if focus.date == Some(today) => Ok(focus),
            Ok(_) => Ok(empty),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable today file");
                Ok(empty)
            }
        }
    }

    /// Replace the list wholesale.
    pub fn set(&self, today: NaiveDate, task_ids: &[String]) -> Result<TodayFocus> {
        let mut ids: Vec<String> = Vec::with_capacity(task_ids.len());
        for id in task_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        let focus = TodayFocus {
            date: Some(today),
            task_ids: ids,
        };
        write_atomic(&self.path, serde_json::to_string_pretty(&focus)?.as_bytes())?;
        Ok(focus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[test]
    fn set_trims_and_dedups_in_order() {
        let dir = tempdir().unwrap();
        let store = TodayStore::open(dir.path());
        let saved = store
            .set(
                day(10),
                &[" task-002".into(), "".into(), "task-001".into(), "task-002".into()],
            )
            .unwrap();
        assert_eq!(saved.task_ids, vec!["task-002", "task-001"]);
        assert_eq!(store.get(day(10)).unwrap(), saved);
    }

    #[test]
    fn list_from_previous_day_reads_empty() {
        let dir = tempdir().unwrap();
        let store = TodayStore::open(dir.path());
        store.set(day(9), &["task-001".into()]).unwrap();
        let focus = store.get(day(10)).unwrap();
        assert!(focus.task_ids.is_empty());
        assert_eq!(focus.date, Some(day(10)));
    }

    #[test]
    fn missing_or_garbled_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = TodayStore::open(dir.path());
        assert!(store.get(day(10)).unwrap().task_ids.is_empty());

        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(dir.path().join(CONFIG_DIR).join(TODAY_FILE), "{not json").unwrap();
        assert!(store.get(day(10)).unwrap().task_ids.is_empty());
    }
}
