// ─── Event Push Channel ───
// Fire-and-forget events from the backend to whichever UI surface is open.
// Topics are stable strings under the `core://` prefix; payloads are plain
// serde structs. The sink is injected so core modules never depend on a
// window handle directly.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

pub const INSTANCE_INSTALLED: &str = "core://instance-installed";
pub const INSTANCE_UPDATED: &str = "core://instance-updated";
pub const INSTANCE_DELETED: &str = "core://instance-deleted";
pub const INSTANCE_LAUNCHED: &str = "core://instance-launched";
pub const INSTANCE_KILLED: &str = "core://instance-killed";
pub const INSTANCE_EXITED: &str = "core://instance-exited";
pub const INSTANCE_LOG: &str = "core://instance-log";
pub const INSTANCE_CRASH: &str = "core://crash";
pub const RESOURCES_UPDATED: &str = "core://resources-updated";
pub const NOTIFICATION: &str = "core://notification";
pub const NOTIFICATION_PROGRESS: &str = "core://notification-progress";
pub const NOTIFICATION_UPDATED: &str = "core://notification-updated";

/// Anything that can deliver a topic + JSON payload to the frontend.
///
/// The production implementation wraps `tauri::AppHandle`; tests use an
/// in-memory collector.
pub trait EventSink: Send + Sync {
    fn emit_json(&self, topic: &str, payload: serde_json::Value);
}

impl EventSink for tauri::AppHandle {
    fn emit_json(&self, topic: &str, payload: serde_json::Value) {
        use tauri::Emitter;
        let _ = self.emit(topic, payload);
    }
}

/// Serialize and push an event; delivery failures are logged, never fatal.
pub fn emit<T: Serialize>(sink: &Arc<dyn EventSink>, topic: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit_json(topic, value),
        Err(e) => warn!("Cannot serialize payload for {}: {}", topic, e),
    }
}

// ── Payloads ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct InstanceEvent {
    pub instance_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceExitEvent {
    pub instance_id: i64,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrashEvent {
    pub instance_id: i64,
    pub exit_code: Option<i32>,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub instance_id: i64,
    pub line: String,
}

/// Stdout/stderr lines are batched to keep the IPC channel quiet while the
/// game floods its log.
#[derive(Debug, Clone, Serialize)]
pub struct LogBatch {
    pub lines: Vec<LogLine>,
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects emitted events for assertions.
    #[derive(Default)]
    pub struct CollectingSink {
        pub events: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl EventSink for CollectingSink {
        fn emit_json(&self, topic: &str, payload: serde_json::Value) {
            self.events
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
        }
    }

    impl CollectingSink {
        pub fn topics(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(t, _)| t.clone())
                .collect()
        }
    }
}
