// SPDX-License-Identifier: MPL-2.0

//! Staged processing pipelines
//!
//! Every multi-step job is a [`scheduler::StagedTask`] whose stages alternate
//! between the background pool and the foreground loop, so heavy pixel work
//! never runs where results are published.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌──────────────┐
//! │ Stored JPEG  │ ──▶ │  Aging Pipeline    │ ──▶ │  Aged JPEG   │
//! │ + record     │     │  - Shrink          │     │  + record    │
//! │              │     │  - NV21 desaturate │     │              │
//! │              │     │  - Re-encode       │     │              │
//! └──────────────┘     └────────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`dispatch`]: Foreground/background contexts and completion handles
//! - [`scheduler`]: Alternating-context staged executor
//! - [`aging`]: Generation-by-generation photo aging
//! - [`sample`]: Noise-driven sample image synthesis

pub mod aging;
pub mod dispatch;
pub mod sample;
pub mod scheduler;

pub use aging::{AgingConfig, PhotoAger};
pub use dispatch::{Completion, Context, Dispatcher, ForegroundLoop};
pub use scheduler::{StageResult, StagedScheduler, StagedTask, TaskOutcome};
