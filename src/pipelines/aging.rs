// SPDX-License-Identifier: GPL-3.0-only
//! Photo aging pipeline
//!
//! Advances a photo one age state at a time until it reaches its target.
//! Every generation is decoded, shrunk to the logical size of its new age,
//! drained of color through an NV21 round trip and re-encoded at the new
//! age's JPEG quality, so the losses compound.

use crate::errors::AgeResult;
use crate::media::{bitmap, yuv};
use crate::photo::age;
use crate::photo::record::PhotoRecord;
use tracing::{debug, info};

/// Aging parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgingConfig {
    /// Landscape size of an age-0 photo; portrait photos swap the axes
    pub logical_size: (u32, u32),
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            logical_size: age::DEFAULT_LOGICAL_SIZE,
        }
    }
}

/// One produced generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    pub record: PhotoRecord,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub encoded_len: usize,
}

#[derive(Debug)]
struct AgedPhoto {
    record: PhotoRecord,
    jpeg: Vec<u8>,
    history: Vec<Generation>,
}

/// Lazily ages one photo
///
/// Nothing runs until the first accessor is called. The outcome, error
/// included, is kept and returned by every later call.
#[derive(Debug)]
pub struct PhotoAger {
    config: AgingConfig,
    source: PhotoRecord,
    source_jpeg: Vec<u8>,
    result: Option<AgeResult<AgedPhoto>>,
}

impl PhotoAger {
    pub fn new(record: PhotoRecord, jpeg: Vec<u8>) -> Self {
        Self::with_config(record, jpeg, AgingConfig::default())
    }

    pub fn with_config(record: PhotoRecord, jpeg: Vec<u8>, config: AgingConfig) -> Self {
        Self {
            config,
            source: record,
            source_jpeg: jpeg,
            result: None,
        }
    }

    pub fn source(&self) -> PhotoRecord {
        self.source
    }

    fn aged(&mut self) -> AgeResult<&AgedPhoto> {
        let result = self
            .result
            .get_or_insert_with(|| age_photo(&self.config, self.source, &self.source_jpeg));
        match result {
            Ok(aged) => Ok(&*aged),
            Err(e) => Err(e.clone()),
        }
    }

    /// Encoded image at the target age
    pub fn aged_jpeg(&mut self) -> AgeResult<&[u8]> {
        self.aged().map(|aged| aged.jpeg.as_slice())
    }

    /// Record at the target age
    pub fn aged_record(&mut self) -> AgeResult<PhotoRecord> {
        self.aged().map(|aged| aged.record)
    }

    /// Every generation produced, oldest last; empty when no aging was needed
    pub fn history(&mut self) -> AgeResult<&[Generation]> {
        self.aged().map(|aged| aged.history.as_slice())
    }

    /// Consume the ager, returning the final record and image
    pub fn into_aged(self) -> AgeResult<(PhotoRecord, Vec<u8>)> {
        let aged = match self.result {
            Some(result) => result?,
            None => age_photo(&self.config, self.source, &self.source_jpeg)?,
        };
        Ok((aged.record, aged.jpeg))
    }
}

fn age_photo(config: &AgingConfig, source: PhotoRecord, jpeg: &[u8]) -> AgeResult<AgedPhoto> {
    if !source.needs_aging() {
        return Ok(AgedPhoto {
            record: source,
            jpeg: jpeg.to_vec(),
            history: Vec::new(),
        });
    }

    info!(
        id = source.id(),
        from = source.current_age(),
        to = source.target_age(),
        "Aging photo"
    );

    let mut record = source;
    let mut current = jpeg.to_vec();
    let mut history = Vec::new();
    let mut orientation = None;
    let mut packed = Vec::new();

    while record.needs_aging() {
        let decoded = bitmap::decode(&current)?;
        let portrait = *orientation.get_or_insert_with(|| bitmap::is_portrait(&decoded));

        let previous_age = record.current_age();
        let new_age = previous_age + 1;
        let mut next = record.to_builder();
        next.set_current_age(new_age)?;

        // Never upscale: a small source keeps its size until the schedule catches up
        let (lw, lh) = age::logical_size(new_age, portrait, config.logical_size);
        let (w, h) = decoded.dimensions();
        let mut image = bitmap::scale_to_fit(decoded, (lw.min(w), lh.min(h)));

        let previous_scale = age::color_scale(previous_age);
        if previous_scale != 0.0 {
            let ratio = age::color_scale(new_age) / previous_scale;
            let (w, h) = image.dimensions();
            let nv21 = yuv::encode_nv21(&image, 1.0, ratio);
            yuv::decode_nv21(&nv21, w, h, &mut packed)?;
            image = yuv::packed_to_rgb(&packed, w, h)?;
        }

        let quality = age::jpeg_quality(new_age);
        current = bitmap::encode_jpeg(&image, quality)?;
        record = next.freeze()?;

        debug!(
            id = record.id(),
            age = new_age,
            width = image.width(),
            height = image.height(),
            quality,
            bytes = current.len(),
            "Aged one generation"
        );
        history.push(Generation {
            record,
            width: image.width(),
            height: image.height(),
            quality,
            encoded_len: current.len(),
        });
    }

    Ok(AgedPhoto {
        record,
        jpeg: current,
        history,
    })
}
