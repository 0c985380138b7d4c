//! In-memory native module for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use mwa_core::{AssociationConfig, NativeModule, StructuredError};

/// Records every call; answers scripted results, `{}` otherwise.
#[derive(Default)]
pub struct RecordingModule {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<HashMap<String, Value>>,
    failure: Mutex<Option<StructuredError>>,
    start_failure: Mutex<Option<StructuredError>>,
    end_failure: Mutex<Option<StructuredError>>,
    starts: AtomicUsize,
    ends: AtomicUsize,
}

impl RecordingModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, result: Value) {
        self.responses.lock().insert(method.to_string(), result);
    }

    /// Fail every `invoke` with `error`
    pub fn fail_with(&self, error: StructuredError) {
        *self.failure.lock() = Some(error);
    }

    pub fn fail_start(&self, error: StructuredError) {
        *self.start_failure.lock() = Some(error);
    }

    pub fn fail_end(&self, error: StructuredError) {
        *self.end_failure.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NativeModule for RecordingModule {
    async fn start_session(&self, _config: Option<AssociationConfig>) -> Result<(), StructuredError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match self.start_failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, StructuredError> {
        self.calls.lock().push((method.to_string(), params));
        if let Some(e) = self.failure.lock().clone() {
            return Err(e);
        }
        Ok(self
            .responses
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    async fn end_session(&self) -> Result<(), StructuredError> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        match self.end_failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
