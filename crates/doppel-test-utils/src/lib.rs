// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Doppel integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockPlatform`] - Platform adapter with scripted sends and injectable inbound messages
//! - [`MockGenerator`] - Text generator with scripted completions
//! - [`PipelineHarness`] - Orchestrator over mocks, optionally journaled to SQLite

pub mod harness;
pub mod mock_generator;
pub mod mock_platform;

pub use harness::{PipelineHarness, PipelineHarnessBuilder};
pub use mock_generator::MockGenerator;
pub use mock_platform::{MockPlatform, SendStep};
