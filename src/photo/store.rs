// SPDX-License-Identifier: GPL-3.0-only

//! Photo collection gated by an availability state machine
//!
//! ```text
//! Start --open()--> Opening --loaded--> Open --close()--> Closed
//!                      |
//!                      +--load failed--> Failed
//! ```
//!
//! `open()` returns as soon as the store is `Opening`; the catalog is read
//! in a background stage and the listener hears about the settled state from
//! the foreground. `Failed` is terminal and keeps its message.
//!
//! Mutations follow the same shape: file work in a background stage that
//! only stages the new image, the in-memory commit in the foreground, then
//! the catalog write and the image promotion in the background. Any failure
//! after the commit rolls the record back, so the live image and the catalog
//! always describe the same age.

use super::age;
use super::record::{PhotoRecord, PhotoRecordBuilder};
use crate::errors::{AgeError, AgeResult};
use crate::media::bitmap;
use crate::pipelines::aging::{AgingConfig, PhotoAger};
use crate::pipelines::dispatch::{Completer, Completion, Dispatcher, completion};
use crate::pipelines::scheduler::{StageResult, StagedScheduler, StagedTask, run_in_background};
use crate::storage::PhotoLibrary;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Availability of a [`PhotoStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreState {
    Start,
    Opening,
    Open,
    Closed,
    Failed,
}

/// Receives settled store states on the foreground
pub trait StoreListener: Send + 'static {
    fn state_changed(&mut self, state: StoreState);
}

impl<F> StoreListener for F
where
    F: FnMut(StoreState) + Send + 'static,
{
    fn state_changed(&mut self, state: StoreState) {
        self(state)
    }
}

/// Tuning for store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    pub aging: AgingConfig,
    /// Simulated delay between stages; 0 disables it
    pub stage_delay_ms: u64,
}

#[derive(Debug)]
struct Inner {
    state: StoreState,
    failure: Option<String>,
    /// Sorted by id
    records: Vec<PhotoRecord>,
    next_id: i64,
    /// Photos with an aging pass underway
    busy: HashSet<i64>,
    /// Bumped on every committed change
    revision: u64,
}

impl Inner {
    fn require_open(&self) -> AgeResult<()> {
        match self.state {
            StoreState::Open => Ok(()),
            state => Err(AgeError::invalid_state(format!(
                "photo store is {:?}, expected Open",
                state
            ))),
        }
    }

    fn position(&self, id: i64) -> Result<usize, usize> {
        let key = PhotoRecordBuilder::sentinel(id);
        self.records.binary_search_by(|record| key.compare(record).reverse())
    }

    fn find(&self, id: i64) -> Option<PhotoRecord> {
        self.position(id).ok().map(|index| self.records[index])
    }
}

struct Shared {
    library: PhotoLibrary,
    inner: Mutex<Inner>,
    listener: Mutex<Box<dyn StoreListener>>,
    /// Revision of the newest catalog on disk
    saved_revision: Mutex<Option<u64>>,
}

impl Shared {
    fn notify(&self, state: StoreState) {
        self.listener.lock().state_changed(state);
    }

    fn settle_open(&self, loaded: AgeResult<Vec<PhotoRecord>>) {
        let state = {
            let mut inner = self.inner.lock();
            if inner.state != StoreState::Opening {
                debug!(state = ?inner.state, "Ignoring late open completion");
                return;
            }

            match loaded {
                Ok(records) => {
                    inner.next_id = records.last().map_or(1, |r| r.id() + 1);
                    info!(count = records.len(), "Photo store open");
                    inner.records = records;
                    inner.state = StoreState::Open;
                }
                Err(e) => {
                    error!(error = %e, "Photo store failed to open");
                    inner.failure = Some(e.to_string());
                    inner.state = StoreState::Failed;
                }
            }
            inner.state
        };
        self.notify(state);
    }

    /// Insert or replace `record`, returning what it replaced
    fn commit(&self, record: PhotoRecord) -> AgeResult<Committed> {
        let mut inner = self.inner.lock();
        inner.require_open()?;

        let previous = match inner.position(record.id()) {
            Ok(index) => Some(std::mem::replace(&mut inner.records[index], record)),
            Err(index) => {
                inner.records.insert(index, record);
                None
            }
        };
        inner.revision += 1;
        Ok(Committed {
            record,
            previous,
            revision: inner.revision,
            snapshot: inner.records.clone(),
        })
    }

    /// Undo a commit if `record` is still the stored version
    fn rollback(&self, committed: &Committed) -> Option<(u64, Vec<PhotoRecord>)> {
        let mut inner = self.inner.lock();
        let index = inner.position(committed.record.id()).ok()?;
        if inner.records[index] != committed.record {
            return None;
        }
        match committed.previous {
            Some(previous) => inner.records[index] = previous,
            None => {
                inner.records.remove(index);
            }
        }
        inner.revision += 1;
        Some((inner.revision, inner.records.clone()))
    }

    fn release(&self, id: i64) {
        self.inner.lock().busy.remove(&id);
    }

    /// Write a catalog snapshot unless a newer one is already on disk
    fn save(&self, revision: u64, records: &[PhotoRecord]) -> AgeResult<()> {
        let mut saved = self.saved_revision.lock();
        if saved.is_some_and(|newest| newest > revision) {
            debug!(revision, "Skipping stale catalog snapshot");
            return Ok(());
        }
        self.library.save_catalog(records)?;
        *saved = Some(revision);
        Ok(())
    }
}

/// The photo collection
pub struct PhotoStore {
    shared: Arc<Shared>,
    dispatcher: Dispatcher,
    options: StoreOptions,
}

impl PhotoStore {
    pub fn new(library: PhotoLibrary, dispatcher: Dispatcher, listener: impl StoreListener) -> Self {
        Self::with_options(library, dispatcher, listener, StoreOptions::default())
    }

    pub fn with_options(
        library: PhotoLibrary,
        dispatcher: Dispatcher,
        listener: impl StoreListener,
        options: StoreOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                library,
                inner: Mutex::new(Inner {
                    state: StoreState::Start,
                    failure: None,
                    records: Vec::new(),
                    next_id: 1,
                    busy: HashSet::new(),
                    revision: 0,
                }),
                listener: Mutex::new(Box::new(listener)),
                saved_revision: Mutex::new(None),
            }),
            dispatcher,
            options,
        }
    }

    pub fn library(&self) -> &PhotoLibrary {
        &self.shared.library
    }

    pub fn state(&self) -> StoreState {
        self.shared.inner.lock().state
    }

    /// Why the store failed to open, once it has
    pub fn failure_message(&self) -> Option<String> {
        self.shared.inner.lock().failure.clone()
    }

    /// Begin opening. Only valid from `Start`; a no-op once `Failed`.
    pub fn open(&self) -> AgeResult<()> {
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                StoreState::Start => inner.state = StoreState::Opening,
                StoreState::Failed => {
                    debug!("Photo store already failed, ignoring open");
                    return Ok(());
                }
                state => {
                    return Err(AgeError::invalid_state(format!(
                        "cannot open a photo store that is {:?}",
                        state
                    )));
                }
            }
        }

        info!(root = %self.shared.library.root().display(), "Opening photo store");
        let task = OpenTask {
            shared: Arc::clone(&self.shared),
            loaded: None,
        };
        self.start("store-open", task)
    }

    /// Close an open store. Fails while `Opening`; a no-op once `Failed`.
    pub fn close(&self) -> AgeResult<()> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            StoreState::Open => {
                inner.state = StoreState::Closed;
                info!("Photo store closed");
                Ok(())
            }
            StoreState::Failed => Ok(()),
            state => Err(AgeError::invalid_state(format!(
                "cannot close a photo store that is {:?}",
                state
            ))),
        }
    }

    /// Snapshot of every record, sorted by id
    pub fn records(&self) -> AgeResult<Vec<PhotoRecord>> {
        let inner = self.shared.inner.lock();
        inner.require_open()?;
        Ok(inner.records.clone())
    }

    pub fn record(&self, id: i64) -> AgeResult<Option<PhotoRecord>> {
        let inner = self.shared.inner.lock();
        inner.require_open()?;
        Ok(inner.find(id))
    }

    fn start(&self, name: &str, task: impl StagedTask) -> AgeResult<()> {
        let mut scheduler = StagedScheduler::new(name, self.dispatcher.clone(), task);
        scheduler.set_stage_delay(self.options.stage_delay_ms)?;
        scheduler.start().map(|_| ())
    }

    fn update<F>(
        &self,
        name: &str,
        id: i64,
        holds_busy: bool,
        work: F,
    ) -> AgeResult<Completion<PhotoRecord>>
    where
        F: FnOnce(&PhotoLibrary) -> AgeResult<PhotoRecord> + Send + 'static,
    {
        let (completer, result) = completion();
        let task = CatalogUpdate {
            shared: Arc::clone(&self.shared),
            id,
            holds_busy,
            work: Some(Box::new(work)),
            produced: None,
            committed: None,
            outcome: None,
            completer: Some(completer),
        };
        self.start(name, task)?;
        Ok(result)
    }

    /// Add a captured photo
    ///
    /// The image is decoded, rotated clockwise by `rotation_degrees` (a
    /// multiple of 90) and stored at the age-0 quality. Resolves to the new
    /// record once the catalog is written.
    pub fn import(&self, jpeg: Vec<u8>, rotation_degrees: i32) -> AgeResult<Completion<PhotoRecord>> {
        if rotation_degrees % 90 != 0 {
            return Err(AgeError::invalid_argument(format!(
                "rotation must be a multiple of 90 degrees, got {}",
                rotation_degrees
            )));
        }

        let record = {
            let mut inner = self.shared.inner.lock();
            inner.require_open()?;
            let record = PhotoRecordBuilder::new(inner.next_id).freeze()?;
            inner.next_id += 1;
            record
        };
        info!(id = record.id(), rotation_degrees, bytes = jpeg.len(), "Importing photo");

        self.update("store-import", record.id(), false, move |library: &PhotoLibrary| {
            let image = bitmap::rotate(bitmap::decode(&jpeg)?, rotation_degrees)?;
            let encoded = bitmap::encode_jpeg(&image, age::jpeg_quality(0))?;
            library.stage_photo(record.id(), &encoded)?;
            Ok(record)
        })
    }

    /// Age a photo to `target`
    ///
    /// The aging pass runs in one background stage over the stored image.
    /// Fails straight away for unknown ids, targets below the current age,
    /// or a photo that is already being aged.
    pub fn age(&self, id: i64, target: u32) -> AgeResult<Completion<PhotoRecord>> {
        let requested = {
            let mut inner = self.shared.inner.lock();
            inner.require_open()?;
            let stored = inner
                .find(id)
                .ok_or_else(|| AgeError::invalid_argument(format!("no photo with id {}", id)))?;
            if inner.busy.contains(&id) {
                return Err(AgeError::invalid_state(format!("photo {} is already aging", id)));
            }

            let mut builder = stored.to_builder();
            builder.set_target_age(target)?;
            let requested = builder.freeze()?;
            inner.busy.insert(id);
            requested
        };
        info!(id, from = requested.current_age(), to = target, "Aging stored photo");

        let aging = self.options.aging;
        self.update("store-age", id, true, move |library: &PhotoLibrary| {
            let jpeg = library.read_photo(id)?;
            let (aged, bytes) = PhotoAger::with_config(requested, jpeg, aging).into_aged()?;
            library.stage_photo(id, &bytes)?;
            Ok(aged)
        })
    }

    /// Persist the current catalog
    pub fn sync(&self) -> AgeResult<Completion<()>> {
        let (revision, records) = {
            let inner = self.shared.inner.lock();
            inner.require_open()?;
            (inner.revision, inner.records.clone())
        };

        let shared = Arc::clone(&self.shared);
        run_in_background(
            "store-sync",
            self.dispatcher.clone(),
            self.options.stage_delay_ms,
            move || shared.save(revision, &records),
        )
    }

    /// Read a stored image
    pub fn photo_bytes(&self, id: i64) -> AgeResult<Completion<Vec<u8>>> {
        {
            let inner = self.shared.inner.lock();
            inner.require_open()?;
            if inner.find(id).is_none() {
                return Err(AgeError::invalid_argument(format!("no photo with id {}", id)));
            }
        }

        let library = self.shared.library.clone();
        run_in_background(
            "store-read",
            self.dispatcher.clone(),
            self.options.stage_delay_ms,
            move || library.read_photo(id),
        )
    }
}

struct OpenTask {
    shared: Arc<Shared>,
    loaded: Option<AgeResult<Vec<PhotoRecord>>>,
}

impl StagedTask for OpenTask {
    fn execute(&mut self, stage: u32) -> StageResult {
        if stage == 0 {
            self.loaded = Some(self.shared.library.load_catalog());
            return StageResult::Continue;
        }

        let loaded = self
            .loaded
            .take()
            .unwrap_or_else(|| Err(AgeError::invalid_state("open stage out of order")));
        self.shared.settle_open(loaded);
        StageResult::Done
    }
}

type UpdateWork = Box<dyn FnOnce(&PhotoLibrary) -> AgeResult<PhotoRecord> + Send>;

/// A record applied in memory but not yet on disk
struct Committed {
    record: PhotoRecord,
    previous: Option<PhotoRecord>,
    revision: u64,
    snapshot: Vec<PhotoRecord>,
}

/// Background staging, foreground commit, background persist, foreground reply
struct CatalogUpdate {
    shared: Arc<Shared>,
    id: i64,
    /// Whether this update owns the photo's busy mark
    holds_busy: bool,
    work: Option<UpdateWork>,
    produced: Option<AgeResult<PhotoRecord>>,
    committed: Option<Committed>,
    outcome: Option<AgeResult<PhotoRecord>>,
    completer: Option<Completer<PhotoRecord>>,
}

impl CatalogUpdate {
    /// Save the catalog, then put the staged image live
    ///
    /// On failure the staged image is dropped and the commit is undone in
    /// memory and on disk.
    fn persist(&self, committed: Committed) -> AgeResult<PhotoRecord> {
        let library = &self.shared.library;
        let persisted = self
            .shared
            .save(committed.revision, &committed.snapshot)
            .and_then(|()| library.promote_photo(self.id));

        let Err(e) = persisted else {
            return Ok(committed.record);
        };

        self.discard_staged();
        if let Some((revision, snapshot)) = self.shared.rollback(&committed) {
            warn!(id = self.id, revision, "Rolled back photo record");
            if let Err(restore) = self.shared.save(revision, &snapshot) {
                error!(id = self.id, error = %restore, "Could not restore catalog");
            }
        }
        Err(e)
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.holds_busy) {
            self.shared.release(self.id);
        }
    }

    fn discard_staged(&self) {
        if let Err(e) = self.shared.library.discard_staged_photo(self.id) {
            warn!(id = self.id, error = %e, "Could not discard staged photo");
        }
    }

    fn finish(&mut self, result: AgeResult<PhotoRecord>) -> StageResult {
        if let Err(e) = &result {
            warn!(id = self.id, error = %e, "Photo update failed");
        }
        // Released before replying so the caller can age the photo again at once
        self.release();
        if let Some(completer) = self.completer.take() {
            completer.complete(result);
        }
        StageResult::Done
    }
}

impl StagedTask for CatalogUpdate {
    fn execute(&mut self, stage: u32) -> StageResult {
        match stage {
            0 => {
                if let Some(work) = self.work.take() {
                    self.produced = Some(work(&self.shared.library));
                }
                StageResult::Continue
            }
            1 => {
                let produced = self
                    .produced
                    .take()
                    .unwrap_or_else(|| Err(AgeError::invalid_state("update stage out of order")));
                match produced.and_then(|record| self.shared.commit(record)) {
                    Ok(committed) => self.committed = Some(committed),
                    Err(e) => self.outcome = Some(Err(e)),
                }
                StageResult::Continue
            }
            2 => {
                let outcome = match self.committed.take() {
                    Some(committed) => self.persist(committed),
                    None => {
                        self.discard_staged();
                        self.outcome
                            .take()
                            .unwrap_or_else(|| Err(AgeError::invalid_state("update stage out of order")))
                    }
                };
                self.outcome = Some(outcome);
                StageResult::Continue
            }
            _ => {
                let outcome = self
                    .outcome
                    .take()
                    .unwrap_or_else(|| Err(AgeError::invalid_state("update stage out of order")));
                self.finish(outcome)
            }
        }
    }
}

impl Drop for CatalogUpdate {
    fn drop(&mut self) {
        self.release();
    }
}
