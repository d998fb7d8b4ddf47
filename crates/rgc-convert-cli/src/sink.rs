//! Download sink writing artifacts into a host directory

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use rgc_convert_core::DownloadSink;
use thiserror::Error;

/// Failure to store one artifact
#[derive(Error, Debug)]
#[error("Failed to write {path}: {source}")]
pub struct SinkError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Sanitize a filename by replacing invalid characters
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Default)]
struct SinkState {
    written: Vec<PathBuf>,
    taken: HashSet<PathBuf>,
    errors: Vec<SinkError>,
}

/// Writes every downloaded artifact into one directory.
///
/// Names that were already used by this sink get a ` (n)` suffix, so
/// exporting many mapsets that share asset names never overwrites.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    state: Mutex<SinkState>,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            state: Mutex::new(SinkState::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far
    pub fn written(&self) -> Vec<PathBuf> {
        self.lock().written.clone()
    }

    /// Drain the write errors collected so far
    pub fn take_errors(&self) -> Vec<SinkError> {
        std::mem::take(&mut self.lock().errors)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unique_path(&self, taken: &HashSet<PathBuf>, filename: &str) -> PathBuf {
        let name = sanitize_filename(filename);
        let candidate = self.dir.join(&name);
        if !taken.contains(&candidate) {
            return candidate;
        }

        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
            _ => (name.as_str(), ""),
        };
        (1..)
            .map(|n| self.dir.join(format!("{} ({}){}", stem, n, ext)))
            .find(|p| !taken.contains(p))
            .unwrap_or(candidate)
    }
}

impl DownloadSink for DirectorySink {
    fn download(&self, data: Bytes, filename: &str) {
        let mut state = self.lock();
        let path = self.unique_path(&state.taken, filename);
        state.taken.insert(path.clone());

        match std::fs::write(&path, &data) {
            Ok(()) => {
                tracing::debug!("Wrote {} ({} bytes)", path.display(), data.len());
                state.written.push(path);
            }
            Err(source) => {
                tracing::warn!("Failed to write {}: {}", path.display(), source);
                state.errors.push(SinkError { path, source });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal_name.osz"), "normal_name.osz");
        assert_eq!(sanitize_filename("Artist\\Song"), "Artist_Song");
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("file<>|name"), "file___name");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
        assert_eq!(sanitize_filename(".."), "unnamed");
        assert_eq!(sanitize_filename("   "), "unnamed");
    }

    #[test]
    fn test_directory_sink_writes_and_dedups() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let out = temp.path().join("out");
        let sink = DirectorySink::new(&out).unwrap();

        sink.download(Bytes::from_static(b"one"), "audio.mp3");
        sink.download(Bytes::from_static(b"two"), "audio.mp3");
        sink.download(Bytes::from_static(b"three"), "README");
        sink.download(Bytes::from_static(b"four"), "README");

        let written = sink.written();
        assert_eq!(written.len(), 4);
        assert_eq!(std::fs::read(out.join("audio.mp3")).unwrap(), b"one");
        assert_eq!(std::fs::read(out.join("audio (1).mp3")).unwrap(), b"two");
        assert!(out.join("README (1)").exists());
        assert!(sink.take_errors().is_empty());
    }

    #[test]
    fn test_directory_sink_records_errors() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let sink = DirectorySink::new(temp.path()).unwrap();
        std::fs::create_dir(temp.path().join("taken.zip")).unwrap();

        sink.download(Bytes::from_static(b"zip"), "taken.zip");

        let errors = sink.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("taken.zip"));
        assert!(sink.written().is_empty());
    }
}
