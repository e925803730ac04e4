//! Client-side edit buffer for the canvas board.
//!
//! Holds the authoritative-for-the-moment local patch sequence. Local edits
//! apply immediately; persistence is debounced behind a cancel-and-reschedule
//! timer so at most one save is pending at a time. Incoming fan-out pushes
//! and the initial server fetch reconcile against local state without
//! clobbering in-flight work.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use patchboard_types::api::UpdateBoardRequest;
use patchboard_types::models::Patch;

/// Save window: a mutation schedules persistence this long after the last
/// edit; any edit inside the window cancels and reschedules.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Persists a board update. Failures are the implementation's problem to
/// log; the buffer never blocks an edit on the network.
#[async_trait]
pub trait BoardSaver: Send + Sync + 'static {
    async fn save(&self, update: UpdateBoardRequest);
}

pub struct EditBuffer {
    image_url: String,
    patches: Vec<Patch>,
    saver: Arc<dyn BoardSaver>,
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
}

impl EditBuffer {
    pub fn new(saver: Arc<dyn BoardSaver>) -> Self {
        Self::with_debounce(saver, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(saver: Arc<dyn BoardSaver>, debounce: Duration) -> Self {
        Self {
            image_url: String::new(),
            patches: Vec::new(),
            saver,
            debounce,
            pending: None,
        }
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    // -- Local edits: applied immediately, persisted after the window --

    pub fn add_patch(&mut self, patch: Patch) {
        self.patches.push(patch);
        self.schedule_save();
    }

    pub fn remove_patch(&mut self, id: &str) {
        self.patches.retain(|p| p.id != id);
        self.schedule_save();
    }

    /// Mutate one patch in place (drag, resize, recolor, opacity).
    pub fn update_patch<F>(&mut self, id: &str, f: F)
    where
        F: FnOnce(&mut Patch),
    {
        if let Some(patch) = self.patches.iter_mut().find(|p| p.id == id) {
            f(patch);
            self.schedule_save();
        }
    }

    /// Image references are local to the session (an object URL); setting
    /// one keeps existing patches intact and does not trigger persistence.
    pub fn set_image_url(&mut self, url: String) {
        self.image_url = url;
    }

    // -- Reconciliation --

    /// Initial load: local state, if any, takes precedence over the fetched
    /// sequence; the server seeds the view only when local is empty.
    pub fn seed(&mut self, server_patches: Vec<Patch>) {
        if self.patches.is_empty() && !server_patches.is_empty() {
            self.patches = server_patches;
        }
    }

    /// A fan-out push from another session. An empty incoming sequence is
    /// treated as not-yet-initialized, not as "user deleted everything", so
    /// it never wipes local work. A non-empty sequence replaces the local
    /// one wholesale; any pending save of the now-stale snapshot is
    /// cancelled.
    pub fn apply_remote(&mut self, patches: Vec<Patch>) {
        if patches.is_empty() {
            debug!("Ignoring empty remote patch sequence");
            return;
        }
        self.cancel_pending();
        self.patches = patches;
    }

    /// Logout: drop the pending timer; an in-flight request simply completes
    /// with nobody listening.
    pub fn shutdown(&mut self) {
        self.cancel_pending();
    }

    fn schedule_save(&mut self) {
        self.cancel_pending();

        let saver = self.saver.clone();
        let snapshot = self.patches.clone();
        let window = self.debounce;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            saver
                .save(UpdateBoardRequest {
                    image_url: None,
                    patches: Some(snapshot),
                })
                .await;
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for EditBuffer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
