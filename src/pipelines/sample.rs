// SPDX-License-Identifier: GPL-3.0-only
//! Sample image synthesis from gradient noise
//!
//! A batch renders one image per background stage and collects it on the
//! following foreground stage. The canvas travels with the task, so its
//! buffers are allocated once per batch.

use super::dispatch::{Completer, Completion, Dispatcher, completion};
use super::scheduler::{StageResult, StagedScheduler, StagedTask};
use crate::constants::noise::{DEFAULT_CELL_SIZE, DEFAULT_GRADIENTS, DEFAULT_SEED};
use crate::errors::{AgeError, AgeResult};
use crate::media::bitmap;
use crate::media::noise::{Interpolation, NoiseCanvas, NoiseField};
use crate::photo::age;
use tracing::debug;

/// What to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSpec {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub gradients: usize,
    pub interpolation: Interpolation,
    pub cell_size: f32,
}

impl Default for SampleSpec {
    fn default() -> Self {
        let (width, height) = age::DEFAULT_LOGICAL_SIZE;
        Self {
            width,
            height,
            seed: DEFAULT_SEED,
            gradients: DEFAULT_GRADIENTS,
            interpolation: Interpolation::default(),
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

impl SampleSpec {
    /// Same spec with the seed offset by `index`
    fn nth(&self, index: u32) -> Self {
        Self {
            seed: self.seed.wrapping_add(index as u64),
            ..*self
        }
    }
}

fn render(spec: &SampleSpec, canvas: &mut NoiseCanvas) -> AgeResult<Vec<u8>> {
    let field = NoiseField::with_seed(spec.seed, spec.gradients, spec.interpolation)?;
    let image = canvas.render(&field, spec.width, spec.height, spec.cell_size)?;
    bitmap::encode_jpeg(image, age::jpeg_quality(0))
}

/// Render one sample JPEG on the calling thread
pub fn synthesize(spec: &SampleSpec) -> AgeResult<Vec<u8>> {
    render(spec, &mut NoiseCanvas::new())
}

struct SampleBatch {
    spec: SampleSpec,
    count: u32,
    canvas: NoiseCanvas,
    pending: Option<AgeResult<Vec<u8>>>,
    done: Vec<Vec<u8>>,
    completer: Option<Completer<Vec<Vec<u8>>>>,
}

impl SampleBatch {
    fn finish(&mut self, result: AgeResult<Vec<Vec<u8>>>) -> StageResult {
        if let Some(completer) = self.completer.take() {
            completer.complete(result);
        }
        StageResult::Done
    }
}

impl StagedTask for SampleBatch {
    fn execute(&mut self, stage: u32) -> StageResult {
        let index = stage / 2;
        if stage % 2 == 0 {
            self.pending = Some(render(&self.spec.nth(index), &mut self.canvas));
            return StageResult::Continue;
        }

        match self.pending.take() {
            Some(Ok(jpeg)) => {
                debug!(index, bytes = jpeg.len(), "Sample rendered");
                self.done.push(jpeg);
            }
            Some(Err(e)) => return self.finish(Err(e)),
            None => return self.finish(Err(AgeError::invalid_state("sample stage out of order"))),
        }

        if self.done.len() as u32 >= self.count {
            let done = std::mem::take(&mut self.done);
            self.finish(Ok(done))
        } else {
            StageResult::Continue
        }
    }
}

/// Render `count` samples through the scheduler, seeds `seed..seed + count`
///
/// `count` must be between 1 and 49; each sample takes two stages.
pub fn synthesize_batch(
    dispatcher: Dispatcher,
    spec: SampleSpec,
    count: u32,
    stage_delay_ms: u64,
) -> AgeResult<Completion<Vec<Vec<u8>>>> {
    let limit = crate::constants::scheduler::MAX_STAGES / 2 - 1;
    if count == 0 || count > limit {
        return Err(AgeError::invalid_argument(format!(
            "sample count must be in 1..={}, got {}",
            limit, count
        )));
    }

    let (completer, samples) = completion();
    let batch = SampleBatch {
        spec,
        count,
        canvas: NoiseCanvas::new(),
        pending: None,
        done: Vec::with_capacity(count as usize),
        completer: Some(completer),
    };

    let mut scheduler = StagedScheduler::new("sample-batch", dispatcher, batch);
    scheduler.set_stage_delay(stage_delay_ms)?;
    let _ = scheduler.start()?;
    Ok(samples)
}
