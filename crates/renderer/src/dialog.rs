use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;

use rfd::FileDialog;
use tracing::{debug, info, warn};
use winit::event_loop::EventLoopProxy;

use crate::document::ShaderDocument;
use crate::window::PreviewEvent;

const SHADER_FILTER_NAME: &str = "GLSL shader";
const SHADER_EXTENSIONS: [&str; 4] = ["glsl", "frag", "fs", "fsh"];
const DEFAULT_SAVE_NAME: &str = "shader.glsl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Load,
    Save,
}

/// What came back from a native file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Picked { kind: DialogKind, path: PathBuf },
    Canceled { kind: DialogKind },
    Failed { kind: DialogKind, reason: String },
}

impl DialogOutcome {
    pub fn kind(&self) -> DialogKind {
        match self {
            DialogOutcome::Picked { kind, .. }
            | DialogOutcome::Canceled { kind }
            | DialogOutcome::Failed { kind, .. } => *kind,
        }
    }
}

/// How a dialog outcome changed the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentChange {
    Loaded,
    Saved,
    Unchanged,
}

/// Applies a dialog result to the document. Cancellation and any I/O error
/// leave the document exactly as it was.
pub fn apply_dialog_outcome(document: &mut ShaderDocument, outcome: DialogOutcome) -> DocumentChange {
    match outcome {
        DialogOutcome::Picked {
            kind: DialogKind::Load,
            path,
        } => match document.load_from(&path) {
            Ok(()) => DocumentChange::Loaded,
            Err(err) => {
                warn!(error = %err, "shader load failed");
                DocumentChange::Unchanged
            }
        },
        DialogOutcome::Picked {
            kind: DialogKind::Save,
            path,
        } => match document.save_to(&path) {
            Ok(()) => DocumentChange::Saved,
            Err(err) => {
                warn!(error = %err, "shader save failed");
                DocumentChange::Unchanged
            }
        },
        DialogOutcome::Canceled { kind } => {
            info!(?kind, "file dialog canceled");
            DocumentChange::Unchanged
        }
        DialogOutcome::Failed { kind, reason } => {
            warn!(?kind, %reason, "file dialog failed");
            DocumentChange::Unchanged
        }
    }
}

/// Runs native file dialogs off the event-loop thread.
///
/// The helper thread owns nothing but the proxy; its only effect is a single
/// [`PreviewEvent::Dialog`] delivered back to the loop.
pub(crate) struct DialogLauncher {
    proxy: EventLoopProxy<PreviewEvent>,
    in_flight: bool,
}

impl DialogLauncher {
    pub(crate) fn new(proxy: EventLoopProxy<PreviewEvent>) -> Self {
        Self {
            proxy,
            in_flight: false,
        }
    }

    /// Called by the loop when the outcome event arrives.
    pub(crate) fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Opens a dialog unless one is already showing. Returns an outcome only
    /// when the helper thread could not be started.
    pub(crate) fn open(&mut self, kind: DialogKind, start_dir: Option<&Path>) -> Option<DialogOutcome> {
        if self.in_flight {
            debug!(?kind, "file dialog already open; ignoring request");
            return None;
        }

        let proxy = self.proxy.clone();
        let start_dir = start_dir.map(Path::to_path_buf);
        let spawned = thread::Builder::new()
            .name("glasshader-dialog".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    show_dialog(kind, start_dir.as_deref())
                }))
                .unwrap_or_else(|_| DialogOutcome::Failed {
                    kind,
                    reason: "file dialog panicked".to_string(),
                });
                if proxy.send_event(PreviewEvent::Dialog(outcome)).is_err() {
                    debug!("event loop closed before file dialog returned");
                }
            });

        match spawned {
            Ok(_) => {
                self.in_flight = true;
                None
            }
            Err(err) => Some(DialogOutcome::Failed {
                kind,
                reason: format!("failed to spawn dialog thread: {err}"),
            }),
        }
    }
}

fn show_dialog(kind: DialogKind, start_dir: Option<&Path>) -> DialogOutcome {
    let mut dialog = FileDialog::new().add_filter(SHADER_FILTER_NAME, &SHADER_EXTENSIONS);
    if let Some(dir) = start_dir {
        dialog = dialog.set_directory(dir);
    }

    let picked = match kind {
        DialogKind::Load => dialog.set_title("Load shader").pick_file(),
        DialogKind::Save => dialog
            .set_title("Save shader")
            .set_file_name(DEFAULT_SAVE_NAME)
            .save_file(),
    };

    match picked {
        Some(path) => DialogOutcome::Picked { kind, path },
        None => DialogOutcome::Canceled { kind },
    }
}
