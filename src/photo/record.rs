// SPDX-License-Identifier: GPL-3.0-only

//! Photo identity and age state
//!
//! [`PhotoRecordBuilder`] is the mutable form. [`PhotoRecordBuilder::freeze`]
//! consumes the builder and yields an immutable `Copy` value that can be
//! handed to any context.

use super::age;
use crate::errors::{AgeError, AgeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Immutable snapshot of one photo's identity and age state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhotoRecord {
    id: i64,
    created: i64,
    current_age: u32,
    target_age: u32,
}

/// Wire form: `{"id":..,"created":..,"currentstate":..,"desiredstate":..}`
#[derive(Serialize, Deserialize)]
struct RecordJson {
    id: i64,
    created: i64,
    currentstate: u32,
    desiredstate: u32,
}

impl PhotoRecord {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Creation time in seconds since the Unix epoch
    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }

    pub fn current_age(&self) -> u32 {
        self.current_age
    }

    pub fn target_age(&self) -> u32 {
        self.target_age
    }

    /// True while the photo still has age states to go through
    pub fn needs_aging(&self) -> bool {
        self.target_age > self.current_age
    }

    /// Mutable copy carrying the same fields
    pub fn to_builder(&self) -> PhotoRecordBuilder {
        PhotoRecordBuilder {
            id: self.id,
            created: self.created,
            current_age: self.current_age,
            target_age: self.target_age,
            sentinel: false,
        }
    }

    pub fn to_json(&self) -> AgeResult<String> {
        let wire = RecordJson {
            id: self.id,
            created: self.created,
            currentstate: self.current_age,
            desiredstate: self.target_age,
        };
        serde_json::to_string(&wire)
            .map_err(|e| AgeError::MalformedData(format!("photo record {}: {}", self.id, e)))
    }

    /// Parse the wire form; the result is always frozen
    pub fn parse_json(text: &str) -> AgeResult<Self> {
        let wire: RecordJson = serde_json::from_str(text)
            .map_err(|e| AgeError::MalformedData(format!("photo record: {}", e)))?;

        let mut builder = PhotoRecordBuilder::new(wire.id);
        builder.set_created(wire.created);
        builder
            .set_target_age(wire.desiredstate)
            .and_then(|b| b.set_current_age(wire.currentstate))
            .map_err(|e| AgeError::MalformedData(format!("photo record {}: {}", wire.id, e)))?;
        builder.freeze()
    }
}

/// Mutable photo record under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecordBuilder {
    id: i64,
    created: i64,
    current_age: u32,
    target_age: u32,
    sentinel: bool,
}

impl PhotoRecordBuilder {
    /// Fresh record at age 0, created now
    pub fn new(id: i64) -> Self {
        Self {
            id,
            created: Utc::now().timestamp(),
            current_age: 0,
            target_age: 0,
            sentinel: false,
        }
    }

    /// Id-only lookup key for [`PhotoRecordBuilder::compare`]; cannot be frozen
    pub fn sentinel(id: i64) -> Self {
        Self {
            id,
            created: 0,
            current_age: 0,
            target_age: 0,
            sentinel: true,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    pub fn current_age(&self) -> u32 {
        self.current_age
    }

    pub fn target_age(&self) -> u32 {
        self.target_age
    }

    pub fn set_created(&mut self, seconds: i64) -> &mut Self {
        self.created = seconds;
        self
    }

    /// Order against a frozen record by id
    pub fn compare(&self, record: &PhotoRecord) -> Ordering {
        self.id.cmp(&record.id)
    }

    /// Set the current age; it may not pass the target
    pub fn set_current_age(&mut self, current: u32) -> AgeResult<&mut Self> {
        age::validate(current)?;
        if current > self.target_age {
            return Err(AgeError::invalid_argument(format!(
                "current age {} exceeds target age {}",
                current, self.target_age
            )));
        }
        self.current_age = current;
        Ok(self)
    }

    /// Set the target age; photos never get younger
    pub fn set_target_age(&mut self, target: u32) -> AgeResult<&mut Self> {
        age::validate(target)?;
        if target < self.current_age {
            return Err(AgeError::invalid_argument(format!(
                "target age {} is below current age {}",
                target, self.current_age
            )));
        }
        self.target_age = target;
        Ok(self)
    }

    /// Consume the builder into an immutable record
    pub fn freeze(self) -> AgeResult<PhotoRecord> {
        if self.sentinel {
            return Err(AgeError::invalid_state(format!(
                "sentinel record {} cannot be frozen",
                self.id
            )));
        }
        Ok(PhotoRecord {
            id: self.id,
            created: self.created,
            current_age: self.current_age,
            target_age: self.target_age,
        })
    }
}
