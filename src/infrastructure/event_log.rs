use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Observability events emitted by the weekly reflection gate. Notification
/// outcome is reported here rather than encoded in the gate's return value.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReflectionEvent {
    WindowClosed {
        user_id: String,
    },
    SlotAlreadyTaken {
        user_id: String,
        date: String,
    },
    ReserveFailed {
        user_id: String,
        date: String,
        policy: String,
        message: String,
    },
    GenerationFailed {
        user_id: String,
        date: String,
        message: String,
    },
    PersistFailed {
        user_id: String,
        date: String,
        message: String,
    },
    Generated {
        user_id: String,
        date: String,
    },
    NotificationSent {
        user_id: String,
        email: String,
    },
    NotificationSkipped {
        user_id: String,
    },
    NotificationFailed {
        user_id: String,
        message: String,
    },
}

/// Best-effort sink; recording never fails upward.
pub trait ReflectionEventSink: Send + Sync {
    fn record(&self, event: ReflectionEvent);
}

#[derive(Debug)]
pub struct JsonlEventSink {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonlEventSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }
}

impl ReflectionEventSink for JsonlEventSink {
    fn record(&self, event: ReflectionEvent) {
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let Ok(mut payload) = serde_json::to_value(&event) else {
            return;
        };
        if let Some(object) = payload.as_object_mut() {
            object.insert(
                "timestamp".to_string(),
                serde_json::Value::String(Utc::now().to_rfc3339()),
            );
        }

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(file, "{payload}");
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<ReflectionEvent>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<ReflectionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ReflectionEventSink for InMemoryEventSink {
    fn record(&self, event: ReflectionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
