// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the photo library
//!
//! This module provides command-line functionality for:
//! - Synthesizing sample photos
//! - Aging a single image file
//! - Importing, listing, aging and exporting library photos

use agecam::config::Config;
use agecam::media::bitmap;
use agecam::photo::age;
use agecam::photo::{PhotoRecord, PhotoRecordBuilder, PhotoStore, StoreState};
use agecam::pipelines::sample;
use agecam::pipelines::{Dispatcher, ForegroundLoop, PhotoAger};
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::info;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Default folder name for saving samples and exports
const DEFAULT_SAVE_FOLDER: &str = "agecam";

fn get_default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// An open photo store and the loop that drives it
///
/// Field order matters: the runtime is dropped last.
struct Session {
    store: PhotoStore,
    foreground: ForegroundLoop,
    _runtime: Runtime,
}

impl Session {
    fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let runtime = runtime()?;
        let (dispatcher, mut foreground) = Dispatcher::new(runtime.handle().clone());
        let store = PhotoStore::with_options(
            config.library(),
            dispatcher,
            |state: StoreState| info!(?state, "Photo store state changed"),
            config.store_options(),
        );

        store.open()?;
        foreground.run_until(|| store.state() != StoreState::Opening);
        if store.state() != StoreState::Open {
            let reason = store
                .failure_message()
                .unwrap_or_else(|| format!("store is {:?}", store.state()));
            return Err(format!("Could not open photo library: {}", reason).into());
        }

        Ok(Self {
            store,
            foreground,
            _runtime: runtime,
        })
    }
}

fn print_record(record: &PhotoRecord) {
    let created = record
        .created_at()
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  [{}] age {}/{}  created {}",
        record.id(),
        record.current_age(),
        age::OLDEST,
        created
    );
}

fn output_path(output: Option<PathBuf>, stem: &str) -> std::io::Result<PathBuf> {
    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        return Ok(path);
    }
    let dir = get_default_output_dir();
    std::fs::create_dir_all(&dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("{}_{}.jpg", stem, timestamp)))
}

/// Render noise sample photos through the staged scheduler
pub fn synthesize_samples(config: &Config, count: u32, output_dir: Option<PathBuf>) -> CliResult {
    let runtime = runtime()?;
    let (dispatcher, mut foreground) = Dispatcher::new(runtime.handle().clone());

    let spec = config.sample_spec();
    println!(
        "Rendering {} sample(s) at {}x{} (seed {})",
        count, spec.width, spec.height, spec.seed
    );
    let mut samples = sample::synthesize_batch(dispatcher, spec, count, config.stage_delay_ms)?;
    let samples = foreground.wait_for(&mut samples)?;

    let dir = output_dir.unwrap_or_else(get_default_output_dir);
    std::fs::create_dir_all(&dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    for (index, jpeg) in samples.iter().enumerate() {
        let path = dir.join(format!("sample_{}_{}.jpg", timestamp, index));
        std::fs::write(&path, jpeg)?;
        println!("Sample saved: {}", path.display());
    }
    Ok(())
}

/// Age one image file without touching the library
pub fn age_file(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    from: u32,
    to: u32,
) -> CliResult {
    let jpeg = std::fs::read(input)?;
    let mut builder = PhotoRecordBuilder::new(0);
    builder.set_target_age(to)?;
    builder.set_current_age(from)?;
    let record = builder.freeze()?;

    let mut ager = PhotoAger::with_config(record, jpeg, config.aging());
    for generation in ager.history()? {
        println!(
            "  age {:>2}: {}x{} quality {} ({} bytes)",
            generation.record.current_age(),
            generation.width,
            generation.height,
            generation.quality,
            generation.encoded_len
        );
    }

    let output_path = output_path(output, &format!("aged_{}", to))?;
    std::fs::write(&output_path, ager.aged_jpeg()?)?;
    println!("Aged photo saved: {}", output_path.display());
    Ok(())
}

/// Import an image file into the library
pub fn import_photo(config: &Config, input: &Path, rotation: i32) -> CliResult {
    let jpeg = std::fs::read(input)?;
    if bitmap::sniff_format(&jpeg).is_none() {
        return Err(format!("{} is not a recognized image", input.display()).into());
    }

    let mut session = Session::open(config)?;
    let mut imported = session.store.import(jpeg, rotation)?;
    let record = session.foreground.wait_for(&mut imported)?;
    println!("Imported:");
    print_record(&record);
    Ok(())
}

/// List every photo in the library
pub fn list_photos(config: &Config) -> CliResult {
    let session = Session::open(config)?;
    let records = session.store.records()?;
    if records.is_empty() {
        println!("No photos in {}.", session.store.library().root().display());
        return Ok(());
    }

    println!("Photos in {}:", session.store.library().root().display());
    for record in &records {
        print_record(record);
    }
    Ok(())
}

/// Age a library photo up to `to`
pub fn advance_photo(config: &Config, id: i64, to: u32) -> CliResult {
    let mut session = Session::open(config)?;
    let mut aged = session.store.age(id, to)?;
    let record = session.foreground.wait_for(&mut aged)?;
    println!("Aged:");
    print_record(&record);
    Ok(())
}

/// Copy a library photo out to a file
pub fn export_photo(config: &Config, id: i64, output: Option<PathBuf>) -> CliResult {
    let mut session = Session::open(config)?;
    let mut bytes = session.store.photo_bytes(id)?;
    let jpeg = session.foreground.wait_for(&mut bytes)?;

    let output_path = output_path(output, &format!("photo_{}", id))?;
    std::fs::write(&output_path, jpeg)?;
    println!("Photo saved: {}", output_path.display());
    Ok(())
}
