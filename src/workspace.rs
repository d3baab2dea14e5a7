use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{PlannerError, Result};

/// A workspace root plus the containment check every filesystem access goes through.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Bind to an existing directory. The root is canonicalized once so later
    /// containment checks compare like with like.
    pub fn new(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)
            .map_err(|_| PlannerError::NotInitialized(root.display().to_string()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve workspace-relative segments to an absolute path inside the root.
    ///
    /// Contract:
    /// - each segment may contain '/' or '\\' separators
    /// - '.' and '..' are resolved lexically; popping above the root is rejected
    /// - absolute segments are rejected
    /// - symlinks along the deepest existing ancestor are resolved and the
    ///   result must still be under the canonical root
    ///
    /// Nothing is created or opened here besides the metadata lookups.
    pub fn resolve<I, S>(&self, segments: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts = Vec::new();
        let mut display = Vec::new();
        for segment in segments {
            let segment = segment.as_ref();
            display.push(segment.to_string());
            let normalized = normalize_separators(segment);
            if normalized.starts_with('/') || has_windows_drive_prefix(&normalized) {
                return Err(PlannerError::PathEscape(display.join("/")));
            }
            parts.extend(normalized.split('/').map(str::to_string));
        }

        let normalized = lexical_normalize(parts)
            .ok_or_else(|| PlannerError::PathEscape(display.join("/")))?;

        let mut candidate = self.root.clone();
        candidate.extend(&normalized);
        self.contain(&candidate)
            .ok_or_else(|| PlannerError::PathEscape(display.join("/")))
    }

    /// Canonicalize the deepest existing ancestor and re-check containment.
    fn contain(&self, candidate: &Path) -> Option<PathBuf> {
        let mut existing = candidate.to_path_buf();
        let mut tail = Vec::new();
        while fs::symlink_metadata(&existing).is_err() {
            tail.push(existing.file_name()?.to_os_string());
            if !existing.pop() {
                return None;
            }
        }
        let mut resolved = fs::canonicalize(&existing).ok()?;
        if !resolved.starts_with(&self.root) {
            return None;
        }
        for part in tail.into_iter().rev() {
            resolved.push(part);
        }
        Some(resolved)
    }

    /// Forward-slash path relative to the root, for display and API payloads.
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Validate an externally supplied single path component (id or filename).
pub fn component(input: &str) -> Result<&str> {
    let valid = !input.is_empty()
        && input != "."
        && input != ".."
        && !input.contains(['/', '\\', '\0'])
        && !has_windows_drive_prefix(input);
    if valid {
        Ok(input)
    } else {
        Err(PlannerError::PathEscape(input.to_string()))
    }
}

/// Resolve '.' and '..' lexically. `None` when '..' would climb above the start.
fn lexical_normalize(segments: Vec<String>) -> Option<Vec<String>> {
    let mut normalized = Vec::new();

    for segment in segments {
        match segment.as_str() {
            "" | "." => {}
            ".." => {
                normalized.pop()?;
            }
            _ => normalized.push(segment),
        }
    }

    Some(normalized)
}

fn normalize_separators(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_sep = false;

    for ch in input.chars() {
        let is_sep = ch == '/' || ch == '\\';
        if is_sep {
            if !prev_sep {
                out.push('/');
            }
            prev_sep = true;
        } else {
            out.push(ch);
            prev_sep = false;
        }
    }

    out
}

fn has_windows_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
