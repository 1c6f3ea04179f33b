// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harvest runtime library: render or fetch a listing page, discover its
//! images and their categories, and download them into a categorized
//! dataset.
//!
//! This library crate exposes the pipeline modules for the `harvest`
//! binary and for integration testing.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod harvester;
pub mod metadata;
pub mod progress;
pub mod renderer;

pub use config::HarvestConfig;
pub use harvester::{Harvester, RunSummary, Strategy};
