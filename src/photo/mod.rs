// SPDX-License-Identifier: GPL-3.0-only

//! Photo records, the age schedule and the photo store

pub mod age;
pub mod record;
pub mod store;

pub use record::{PhotoRecord, PhotoRecordBuilder};
pub use store::{PhotoStore, StoreListener, StoreOptions, StoreState};
