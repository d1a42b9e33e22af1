//! Script handle: exclusive invocation and one-shot disposal
//!
//! A handle owns exactly one script execution context. Invocations are
//! serialized through the handle's lock because scripts are not assumed
//! re-entrant; disposal happens exactly once no matter how many teardown
//! paths race for it, and a disposed handle can never be invoked again.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::script::{Script, ScriptError, ScriptResult};

/// Owns one script execution context
pub struct ScriptHandle {
    /// The script, behind an exclusive-invocation lock
    script: Mutex<Box<dyn Script>>,

    /// Set on the first dispose; terminal
    disposed: AtomicBool,
}

impl ScriptHandle {
    /// Wrap a script in a new handle
    pub fn new(script: Box<dyn Script>) -> Self {
        Self {
            script: Mutex::new(script),
            disposed: AtomicBool::new(false),
        }
    }

    /// Invoke the script with the given parameters
    ///
    /// Concurrent invocations against the same handle are serialized.
    /// Invoking a disposed handle fails with [`ScriptError::Disposed`].
    pub async fn invoke(&self, params: &Map<String, Value>) -> ScriptResult<Value> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ScriptError::Disposed);
        }

        let mut script = self.script.lock().await;

        // A dispose may have slipped in while we waited for the lock
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ScriptError::Disposed);
        }

        script.execute(params)
    }

    /// Dispose the script's execution context
    ///
    /// Idempotent: the underlying release runs exactly once; redundant
    /// calls from racing teardown paths are no-ops. Disposal failures are
    /// logged and swallowed so they never block teardown.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!("Script handle already disposed");
            return;
        }

        let mut script = self.script.lock().await;
        if let Err(e) = script.dispose() {
            warn!(error = %e, "Script disposal failed");
        }
    }

    /// Whether the handle has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
