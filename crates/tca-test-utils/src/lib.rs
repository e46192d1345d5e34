//! Testing utilities for TCA workspace
//!
//! Shared test doubles and filesystem fixtures.

#![allow(missing_docs)]

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tca_model::{LanguageModel, ModelError, Sleeper, StructuredRequest};
use tempfile::TempDir;

type Responder = Arc<dyn Fn(&StructuredRequest) -> Result<Value, ModelError> + Send + Sync>;

/// Language model answering from per-capability scripts
///
/// Queued responses are consumed first; once a capability's queue is empty
/// its responder (if any) answers. Every request is recorded.
#[derive(Default)]
pub struct ScriptedModel {
    queues: Mutex<HashMap<String, VecDeque<Result<Value, ModelError>>>>,
    responders: Mutex<HashMap<String, Responder>>,
    calls: Mutex<Vec<StructuredRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_ok(&self, capability: &str, value: Value) -> &Self {
        self.push(capability, Ok(value))
    }

    pub fn push_err(&self, capability: &str, err: ModelError) -> &Self {
        self.push(capability, Err(err))
    }

    pub fn push(&self, capability: &str, response: Result<Value, ModelError>) -> &Self {
        self.queues
            .lock()
            .unwrap()
            .entry(capability.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn respond_with<F>(&self, capability: &str, responder: F) -> &Self
    where
        F: Fn(&StructuredRequest) -> Result<Value, ModelError> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .unwrap()
            .insert(capability.to_string(), Arc::new(responder));
        self
    }

    pub fn calls(&self) -> Vec<StructuredRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, capability: &str) -> Vec<StructuredRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.capability == capability)
            .collect()
    }

    pub fn call_count(&self, capability: &str) -> usize {
        self.calls_for(capability).len()
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete_structured(&self, request: &StructuredRequest) -> Result<Value, ModelError> {
        self.calls.lock().unwrap().push(request.clone());

        let queued = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.capability)
            .and_then(VecDeque::pop_front);
        if let Some(response) = queued {
            return response;
        }

        let responder = self
            .responders
            .lock()
            .unwrap()
            .get(&request.capability)
            .cloned();
        match responder {
            Some(responder) => responder(request),
            None => Err(ModelError::classify(
                Some(400),
                format!("no scripted response for '{}'", request.capability),
            )),
        }
    }
}

/// Sleeper that records durations and returns at once
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn service_unavailable() -> ModelError {
    ModelError::classify(Some(503), "Service unavailable")
}

/// Scenario tree on disk following `TS_<req>/test_<n>/scenario_<n>.xml`
pub struct ScenarioTree {
    dir: TempDir,
}

impl ScenarioTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write one scenario and return its path
    pub fn add(&self, req_id: &str, test: &str, scenario: &str, content: &str) -> PathBuf {
        let dir = self.dir.path().join(format!("TS_{req_id}")).join(test);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{scenario}.xml"));
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write an arbitrary file relative to the root
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }
}

impl Default for ScenarioTree {
    fn default() -> Self {
        Self::new()
    }
}

pub fn scenario_xml(name: &str, setup: &str, check: &str) -> String {
    format!(
        "<scenario name=\"{name}\">\n  <setup>{setup}</setup>\n  <verify>{check}</verify>\n</scenario>\n"
    )
}

pub const SAMPLE_SRS: &str = "1 Introduction\n\
    This document specifies the alerting subsystem.\n\
    \u{c}2 Requirements\n\
    SKYRADAR-ARR-044 The system shall raise an altitude alarm when the\n\
    aircraft altitude is below 500 ft.\n\
    \n\
    SKYRADAR-CPDLC-047 The system shall log every CPDLC message.\n";
