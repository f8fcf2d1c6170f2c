//! Explain-mode narration.
//!
//! Protocol flows report each milestone to a [`Narrator`]. Narration is a
//! side channel: implementations cannot fail and must return promptly.

use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing::info;

/// One protocol milestone as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationStep {
    title: String,
    description: String,
    timestamp: DateTime<Local>,
}

impl NarrationStep {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            timestamp: Local::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

pub trait Narrator: Send + Sync {
    fn step(&self, title: &str, description: &str);
}

/// Discards every step.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNarrator;

impl Narrator for NoopNarrator {
    fn step(&self, _title: &str, _description: &str) {}
}

/// Collects steps in order for later display.
#[derive(Debug, Default)]
pub struct StepLog {
    steps: Mutex<Vec<NarrationStep>>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the recorded steps, leaving the log empty.
    pub fn drain(&self) -> Vec<NarrationStep> {
        match self.steps.lock() {
            Ok(mut steps) => std::mem::take(&mut *steps),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Narrator for StepLog {
    fn step(&self, title: &str, description: &str) {
        // a poisoned log only loses narration, never the operation
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(NarrationStep::new(title, description));
        }
    }
}

/// Forwards steps to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNarrator;

impl Narrator for TracingNarrator {
    fn step(&self, title: &str, description: &str) {
        info!(target: "cipherlab::narration", step = title, "{description}");
    }
}
