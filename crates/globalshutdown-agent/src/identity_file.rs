//! Identity bootstrap: one UUID per machine, persisted in a small text file

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result};
use globalshutdown_core::Identity;

/// Read the identity at `path`, creating it with a fresh UUID if absent.
///
/// An existing file that doesn't parse is an error; it is never overwritten,
/// since that would orphan whatever signal was armed for the old identity.
pub fn load_or_create(path: &Path) -> Result<Identity> {
    match fs::read_to_string(path) {
        Ok(content) => parse(path, &content),
        Err(e) if e.kind() == ErrorKind::NotFound => create(path),
        Err(e) => Err(e).with_context(|| format!("Failed to read identity file: {}", path.display())),
    }
}

/// Read an existing identity without creating one.
pub fn load(path: &Path) -> Result<Identity> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read identity file: {}", path.display()))?;
    parse(path, &content)
}

fn parse(path: &Path, content: &str) -> Result<Identity> {
    Identity::parse(content.trim())
        .with_context(|| format!("Corrupt identity file: {}", path.display()))
}

fn create(path: &Path) -> Result<Identity> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let identity = Identity::generate();
    // create_new: if another process raced us, keep its identity
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return load(path),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create identity file: {}", path.display()));
        }
    };
    file.write_all(identity.to_string().as_bytes())
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Failed to write identity file: {}", path.display()))?;

    log::info!("Created identity {} at {}", identity.short(), path.display());
    Ok(identity)
}
