use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read shader {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write shader {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
struct WatchState {
    interval: Duration,
    last_poll: Option<Instant>,
    modified: Option<SystemTime>,
}

/// In-memory fragment shader text plus the flag telling the frame loop to
/// recompile it.
#[derive(Debug)]
pub struct ShaderDocument {
    text: String,
    path: Option<PathBuf>,
    reload_pending: bool,
    watch: Option<WatchState>,
}

impl ShaderDocument {
    /// A document backed by built-in text. Nothing is pending: the caller
    /// compiles the initial program itself.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            path: None,
            reload_pending: false,
            watch: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let text = read_text(path)?;
        Ok(Self {
            text,
            path: Some(path.to_path_buf()),
            reload_pending: false,
            watch: None,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_reload_pending(&self) -> bool {
        self.reload_pending
    }

    /// Replaces the text with the file's contents and requests a reload.
    /// On error nothing changes.
    pub fn load_from(&mut self, path: &Path) -> Result<(), DocumentError> {
        let text = read_text(path)?;
        info!(path = %path.display(), bytes = text.len(), "loaded shader source");
        self.text = text;
        self.path = Some(path.to_path_buf());
        self.reload_pending = true;
        if let Some(watch) = self.watch.as_mut() {
            watch.modified = modified_time(path);
        }
        Ok(())
    }

    /// Writes the current text verbatim. The document itself is unchanged.
    pub fn save_to(&self, path: &Path) -> Result<(), DocumentError> {
        fs::write(path, self.text.as_bytes()).map_err(|source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), bytes = self.text.len(), "saved shader source");
        Ok(())
    }

    /// Re-reads the file the document came from. Returns `Ok(false)` when the
    /// document has no backing file.
    pub fn reload_from_disk(&mut self) -> Result<bool, DocumentError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        self.load_from(&path)?;
        Ok(true)
    }

    /// Returns whether a reload was requested and clears the request.
    pub fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload_pending)
    }

    pub fn enable_watch(&mut self, interval: Duration) {
        let modified = self.path.as_deref().and_then(modified_time);
        debug!(?interval, "watching shader file for changes");
        self.watch = Some(WatchState {
            interval,
            last_poll: None,
            modified,
        });
    }

    /// Polls the backing file's modification time at most once per watch
    /// interval and loads it when it changed. Returns whether a reload was
    /// requested by this call.
    pub fn poll_changes(&mut self, now: Instant) -> bool {
        let Some(path) = self.path.clone() else {
            return false;
        };
        let Some(watch) = self.watch.as_mut() else {
            return false;
        };
        if watch
            .last_poll
            .is_some_and(|last| now.saturating_duration_since(last) < watch.interval)
        {
            return false;
        }
        watch.last_poll = Some(now);

        let current = modified_time(&path);
        if current.is_none() || current == watch.modified {
            return false;
        }
        watch.modified = current;

        match self.load_from(&path) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "watched shader changed but could not be read");
                false
            }
        }
    }
}

fn read_text(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use tempfile::tempdir;

    const SHADER: &str = "void main() {\r\n\tgl_FragColor = vec4(0.2, 0.4, 0.6, 1.0); // é\n}";

    #[test]
    fn save_then_load_round_trips_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shader.glsl");

        let original = ShaderDocument::from_text(SHADER);
        original.save_to(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), SHADER.as_bytes());

        let mut loaded = ShaderDocument::from_text("");
        loaded.load_from(&path).unwrap();
        assert_eq!(loaded.text(), SHADER);
        assert_eq!(loaded.path(), Some(path.as_path()));
    }

    #[test]
    fn reload_flag_is_read_then_cleared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.frag");
        fs::write(&path, "void main() {}").unwrap();

        let mut doc = ShaderDocument::from_text("x");
        assert!(!doc.take_reload());
        doc.load_from(&path).unwrap();
        assert!(doc.is_reload_pending());
        assert!(doc.take_reload());
        assert!(!doc.take_reload());
    }

    #[test]
    fn failed_load_changes_nothing() {
        let dir = tempdir().unwrap();
        let mut doc = ShaderDocument::from_text("keep me");

        let err = doc.load_from(&dir.path().join("missing.glsl")).unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
        assert_eq!(doc.text(), "keep me");
        assert!(doc.path().is_none());
        assert!(!doc.is_reload_pending());
    }

    #[test]
    fn non_utf8_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binary.frag");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let mut doc = ShaderDocument::from_text("keep");
        assert!(doc.load_from(&path).is_err());
        assert_eq!(doc.text(), "keep");
    }

    #[test]
    fn save_does_not_touch_path_or_flag() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.frag");
        fs::write(&source, "void main() {}").unwrap();
        let mut doc = ShaderDocument::open(&source).unwrap();

        doc.save_to(&dir.path().join("copy.frag")).unwrap();
        assert_eq!(doc.path(), Some(source.as_path()));
        assert!(!doc.take_reload());
    }

    #[test]
    fn reload_from_disk_without_file_is_noop() {
        let mut doc = ShaderDocument::from_text("builtin");
        assert!(!doc.reload_from_disk().unwrap());
        assert!(!doc.is_reload_pending());
    }

    #[test]
    fn watch_picks_up_modified_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watched.frag");
        fs::write(&path, "void main() {}").unwrap();

        let mut doc = ShaderDocument::open(&path).unwrap();
        doc.enable_watch(Duration::from_millis(100));
        let start = Instant::now();
        assert!(!doc.poll_changes(start));

        fs::write(&path, "void main() { gl_FragColor = vec4(1.0); }").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(!doc.poll_changes(start + Duration::from_millis(10)));
        assert!(doc.poll_changes(start + Duration::from_millis(200)));
        assert!(doc.text().contains("gl_FragColor"));
        assert!(doc.take_reload());
        assert!(!doc.poll_changes(start + Duration::from_millis(400)));
    }
}
