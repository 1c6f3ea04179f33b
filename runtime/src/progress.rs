// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for real-time harvest
//! telemetry.
//!
//! The harvester and the acquisition engine emit `HarvestEvent`s, which flow
//! through a `tokio::sync::broadcast` channel to all subscribers (the CLI
//! progress bar, tests). When no subscriber exists, events are silently
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::acquisition::engine::OutcomeKind;

/// A progress event emitted during a harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: HarvestEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HarvestEventKind {
    /// A pipeline stage has started.
    StageStarted { stage: Stage, message: String },
    /// A pipeline stage completed.
    StageCompleted {
        stage: Stage,
        message: String,
        duration_ms: u64,
    },
    /// A stage was skipped or abandoned.
    StageSkipped { stage: Stage, reason: String },
    /// Extraction finished; acquisition is about to start.
    CandidatesDiscovered { categories: u32, candidates: u32 },
    /// One candidate reached its final outcome.
    CandidateFinished {
        url: String,
        category: String,
        outcome: OutcomeKind,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    RenderedFetch,
    StaticFetch,
    Extraction,
    Acquisition,
    Metadata,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RenderedFetch => write!(f, "Rendered fetch"),
            Self::StaticFetch => write!(f, "Static fetch"),
            Self::Extraction => write!(f, "Extraction"),
            Self::Acquisition => write!(f, "Acquisition"),
            Self::Metadata => write!(f, "Metadata"),
        }
    }
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<HarvestEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<HarvestEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// Slow subscribers lag rather than block the run.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(1024)
}

/// Stamps events with the run id and a sequence number and broadcasts them.
///
/// Shared by reference across download workers.
#[derive(Debug, Default)]
pub struct EventEmitter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: AtomicU64,
}

impl EventEmitter {
    pub fn new(tx: Option<ProgressSender>, run_id: impl Into<String>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// An emitter with no channel; every `emit` is a no-op.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Broadcast `event`, ignoring send errors (no receivers listening).
    pub fn emit(&self, event: HarvestEventKind) {
        if let Some(ref sender) = self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = sender.send(HarvestEvent {
                run_id: self.run_id.clone(),
                seq,
                event,
            });
        }
    }
}
