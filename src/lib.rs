// SPDX-License-Identifier: MPL-2.0

//! agecam - photo lifecycle and aging engine for a camera app
//!
//! Photos enter through [`photo::PhotoStore::import`] and grow older one age
//! state at a time: smaller, blurrier in compression and paler, until they
//! end up as small gray prints.
//!
//! # Architecture
//!
//! - [`media`]: NV21 conversion, JPEG codec, gradient noise
//! - [`photo`]: Photo records, the age schedule and the photo store
//! - [`pipelines`]: Execution contexts, staged scheduler, aging and samples
//! - [`storage`]: On-disk photo library
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let (dispatcher, mut foreground) = Dispatcher::new(runtime.handle().clone());
//! let store = PhotoStore::new(library, dispatcher, |state: StoreState| println!("{:?}", state));
//! store.open()?;
//! foreground.run_until(|| store.state() != StoreState::Opening);
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod photo;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AgeError, AgeResult};
pub use photo::{PhotoRecord, PhotoRecordBuilder, PhotoStore, StoreState};
pub use pipelines::{Dispatcher, ForegroundLoop};
