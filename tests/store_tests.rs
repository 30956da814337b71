// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the photo store lifecycle

use agecam::AgeError;
use agecam::media::bitmap;
use agecam::photo::age;
use agecam::photo::{PhotoStore, StoreOptions, StoreState};
use agecam::pipelines::{AgingConfig, Dispatcher, ForegroundLoop};
use agecam::storage::PhotoLibrary;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(20);

struct Harness {
    store: PhotoStore,
    foreground: ForegroundLoop,
    states: Arc<Mutex<Vec<StoreState>>>,
    _runtime: tokio::runtime::Runtime,
}

fn harness(root: &std::path::Path) -> Harness {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let (dispatcher, foreground) = Dispatcher::new(runtime.handle().clone());
    let states = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&states);
    let options = StoreOptions {
        aging: AgingConfig {
            logical_size: (64, 48),
        },
        stage_delay_ms: 0,
    };
    let store = PhotoStore::with_options(
        PhotoLibrary::new(root),
        dispatcher,
        move |state: StoreState| seen.lock().push(state),
        options,
    );
    Harness {
        store,
        foreground,
        states,
        _runtime: runtime,
    }
}

fn open(h: &mut Harness) {
    h.store.open().unwrap();
    assert_eq!(h.store.state(), StoreState::Opening);
    let store = &h.store;
    assert!(h
        .foreground
        .run_until_timeout(WAIT, || store.state() != StoreState::Opening));
}

fn photo(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 3) as u8, (y * 4) as u8, 180])
    });
    bitmap::encode_jpeg(&image, 95).unwrap()
}

#[test]
fn test_open_empty_library_notifies_listener() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&dir.path().join("fresh"));
    open(&mut h);

    assert_eq!(h.store.state(), StoreState::Open);
    assert_eq!(*h.states.lock(), vec![StoreState::Open]);
    assert!(h.store.records().unwrap().is_empty());
    assert_eq!(h.store.failure_message(), None);
}

#[test]
fn test_corrupt_catalog_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("catalog.jsonl"), "{not json\n").unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    assert_eq!(h.store.state(), StoreState::Failed);
    assert_eq!(*h.states.lock(), vec![StoreState::Failed]);
    assert!(h.store.failure_message().unwrap().contains("line 1"));

    // Failed is terminal: open and close are no-ops, everything else refuses
    h.store.open().unwrap();
    h.store.close().unwrap();
    assert_eq!(h.store.state(), StoreState::Failed);
    assert!(matches!(h.store.records(), Err(AgeError::InvalidState(_))));
}

#[test]
fn test_import_age_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    let mut first = h.store.import(photo(64, 48), 0).unwrap();
    let first = h.foreground.wait_for_timeout(&mut first, WAIT).unwrap();
    let mut second = h.store.import(photo(64, 48), 90).unwrap();
    let second = h.foreground.wait_for_timeout(&mut second, WAIT).unwrap();

    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
    assert_eq!(first.current_age(), 0);
    assert_eq!(h.store.records().unwrap(), vec![first, second]);

    // Rotation reached the stored image
    let mut bytes = h.store.photo_bytes(2).unwrap();
    let stored = h.foreground.wait_for_timeout(&mut bytes, WAIT).unwrap();
    assert_eq!(bitmap::decode(&stored).unwrap().dimensions(), (48, 64));

    let mut aged = h.store.age(1, 5).unwrap();
    let aged = h.foreground.wait_for_timeout(&mut aged, WAIT).unwrap();
    assert_eq!(aged.id(), 1);
    assert_eq!(aged.current_age(), 5);
    assert_eq!(aged.target_age(), 5);
    assert_eq!(aged.created(), first.created());
    assert_eq!(h.store.record(1).unwrap(), Some(aged));

    let mut bytes = h.store.photo_bytes(1).unwrap();
    let stored = h.foreground.wait_for_timeout(&mut bytes, WAIT).unwrap();
    let (bw, bh) = age::logical_size(5, false, (64, 48));
    let (w, h_px) = bitmap::decode(&stored).unwrap().dimensions();
    assert!(w <= bw && h_px <= bh);
    assert!(w == bw || h_px == bh, "{}x{} does not fill {}x{}", w, h_px, bw, bh);

    h.store.close().unwrap();
    assert_eq!(h.store.state(), StoreState::Closed);
    assert!(matches!(h.store.records(), Err(AgeError::InvalidState(_))));
    drop(h);

    // The catalog survives a restart and ids keep counting up
    let mut h = harness(dir.path());
    open(&mut h);
    assert_eq!(h.store.records().unwrap(), vec![aged, second]);
    let mut third = h.store.import(photo(32, 32), 0).unwrap();
    let third = h.foreground.wait_for_timeout(&mut third, WAIT).unwrap();
    assert_eq!(third.id(), 3);
}

#[test]
fn test_age_argument_checks() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    let mut imported = h.store.import(photo(64, 48), 0).unwrap();
    let record = h.foreground.wait_for_timeout(&mut imported, WAIT).unwrap();

    assert!(matches!(h.store.age(99, 3), Err(AgeError::InvalidArgument(_))));
    assert!(matches!(h.store.age(record.id(), 12), Err(AgeError::InvalidArgument(_))));

    let mut aged = h.store.age(record.id(), 3).unwrap();
    // A second request while the first is underway is refused
    assert!(matches!(h.store.age(record.id(), 4), Err(AgeError::InvalidState(_))));
    h.foreground.wait_for_timeout(&mut aged, WAIT).unwrap();

    // Photos never get younger
    assert!(matches!(h.store.age(record.id(), 1), Err(AgeError::InvalidArgument(_))));
}

#[test]
fn test_import_of_garbage_fails_without_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    let mut imported = h.store.import(b"not a photo".to_vec(), 0).unwrap();
    let err = h.foreground.wait_for_timeout(&mut imported, WAIT).unwrap_err();
    assert!(matches!(err, AgeError::DecodeFailure(_)));
    assert!(h.store.records().unwrap().is_empty());
}

#[test]
fn test_sync_writes_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    let mut imported = h.store.import(photo(16, 16), 0).unwrap();
    let record = h.foreground.wait_for_timeout(&mut imported, WAIT).unwrap();

    std::fs::remove_file(dir.path().join("catalog.jsonl")).unwrap();
    let mut synced = h.store.sync().unwrap();
    h.foreground.wait_for_timeout(&mut synced, WAIT).unwrap();

    let loaded = PhotoLibrary::new(dir.path()).load_catalog().unwrap();
    assert_eq!(loaded, vec![record]);
}

fn wait_for_file(path: &std::path::Path) {
    let start = std::time::Instant::now();
    while !path.exists() {
        assert!(start.elapsed() < WAIT, "{} never appeared", path.display());
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_close_during_age_keeps_image_and_catalog_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    let mut imported = h.store.import(photo(64, 48), 0).unwrap();
    let record = h.foreground.wait_for_timeout(&mut imported, WAIT).unwrap();

    // The aged image is staged in the background; the commit waits for the foreground
    let mut aged = h.store.age(record.id(), 11).unwrap();
    let library = PhotoLibrary::new(dir.path());
    wait_for_file(&library.staged_photo_path(record.id()));
    h.store.close().unwrap();

    let err = h.foreground.wait_for_timeout(&mut aged, WAIT).unwrap_err();
    assert!(matches!(err, AgeError::InvalidState(_)));
    assert!(!library.staged_photo_path(record.id()).exists());

    let catalog = library.load_catalog().unwrap();
    assert_eq!(catalog, vec![record]);
    let stored = bitmap::decode(&library.read_photo(record.id()).unwrap()).unwrap();
    assert_eq!(stored.dimensions(), age::logical_size(0, false, (64, 48)));
    drop(h);

    // A fresh session ages from the untouched age-0 image
    let mut h = harness(dir.path());
    open(&mut h);
    let mut aged = h.store.age(record.id(), 11).unwrap();
    let aged = h.foreground.wait_for_timeout(&mut aged, WAIT).unwrap();
    assert_eq!(aged.current_age(), 11);
    assert_eq!(library.load_catalog().unwrap(), vec![aged]);
}

#[test]
fn test_failed_catalog_save_rolls_back_age() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path());
    open(&mut h);

    let mut imported = h.store.import(photo(64, 48), 0).unwrap();
    let record = h.foreground.wait_for_timeout(&mut imported, WAIT).unwrap();

    // A directory in the way of the temporary catalog makes every save fail
    let blocker = dir.path().join("catalog.jsonl.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let mut aged = h.store.age(record.id(), 4).unwrap();
    let err = h.foreground.wait_for_timeout(&mut aged, WAIT).unwrap_err();
    assert!(matches!(err, AgeError::Storage(_)));
    assert_eq!(h.store.record(record.id()).unwrap(), Some(record));

    let library = PhotoLibrary::new(dir.path());
    assert!(!library.staged_photo_path(record.id()).exists());
    assert_eq!(library.load_catalog().unwrap(), vec![record]);
    let stored = bitmap::decode(&library.read_photo(record.id()).unwrap()).unwrap();
    assert_eq!(stored.dimensions(), (64, 48));

    // The photo is free to age again once saving works
    std::fs::remove_dir(&blocker).unwrap();
    let mut aged = h.store.age(record.id(), 4).unwrap();
    let aged = h.foreground.wait_for_timeout(&mut aged, WAIT).unwrap();
    assert_eq!(aged.current_age(), 4);
    assert_eq!(library.load_catalog().unwrap(), vec![aged]);
}
