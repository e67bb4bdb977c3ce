//! Thread-safe wrapper for a recording [`Workspace`] used by rspec suites.

use blocksynth::{RecordingEngine, Workspace};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Wrapper that forwards `Send` and `Sync` because access is mutex-guarded.
#[derive(Debug)]
pub struct ThreadSafeWorkspace(pub Workspace<RecordingEngine>);

impl Deref for ThreadSafeWorkspace {
    type Target = Workspace<RecordingEngine>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ThreadSafeWorkspace {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

// SAFETY: rspec environments must implement `Clone + Send + Sync`, but the
// store's listeners are plain boxed closures. Suites run serially through
// `run_serial`, no listener is registered by these tests and every access
// goes through the mutex, so forwarding `Send`/`Sync` is sound here.
unsafe impl Send for ThreadSafeWorkspace {}
unsafe impl Sync for ThreadSafeWorkspace {}

/// Shared pointer type for the wrapped workspace.
pub type SharedWorkspace = Arc<Mutex<ThreadSafeWorkspace>>;

/// Wraps a fresh recording workspace.
#[must_use]
pub fn shared(workspace: Workspace<RecordingEngine>) -> SharedWorkspace {
    Arc::new(Mutex::new(ThreadSafeWorkspace(workspace)))
}

/// Locks the shared workspace, recovering from a poisoned mutex.
pub fn lock(workspace: &SharedWorkspace) -> MutexGuard<'_, ThreadSafeWorkspace> {
    workspace.lock().unwrap_or_else(PoisonError::into_inner)
}
