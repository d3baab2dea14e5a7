use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{PlannerError, Result};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Acquire an exclusive lock on a file, retrying until `timeout` elapses.
/// The lock is released when the returned File is dropped.
pub fn acquire_lock(path: &Path, timeout: Duration) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    let deadline = Instant::now() + timeout;
    loop {
        if file.try_lock_exclusive().is_ok() {
            return Ok(file);
        }
        if Instant::now() >= deadline {
            return Err(PlannerError::Locked(path.display().to_string()));
        }
        thread::sleep(LOCK_RETRY_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_times_out_until_released() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("test.lock");

        let file = acquire_lock(&lock_path, Duration::ZERO).unwrap();
        let err = acquire_lock(&lock_path, Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, PlannerError::Locked(_)));

        drop(file);
        let _file = acquire_lock(&lock_path, Duration::ZERO).unwrap();
    }
}
