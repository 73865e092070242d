use anyhow::{bail, Context, Result};
use std::path::Path;
use zapstreak::audio;
use zapstreak::store::SqliteStore;

pub(crate) fn list_input_devices() -> Result<()> {
    // ZAPSTREAK_TEST_DEVICES stands in for the host's devices in tests.
    let devices = if let Ok(raw) = std::env::var("ZAPSTREAK_TEST_DEVICES") {
        parse_device_list(&raw)
    } else {
        audio::list_input_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub(crate) fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Relabel a stored event after reviewing it.
pub(crate) fn mark_event(database: &Path, id: i64, is_zap: bool) -> Result<()> {
    let store = open_store(database)?;
    if !store.update_zap_status(id, is_zap)? {
        bail!("no audio event with id {id}");
    }
    let label = if is_zap { "a zap" } else { "not a zap" };
    println!("Event {id} marked as {label}.");
    Ok(())
}
