// Pixel constant manager settings, stored as a small JSON document next to
// the rest of the emulator configuration.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelConstantsConfig {
    /// Emit a `trace!` record for every color latch and constant push.
    ///
    /// The logger's level filter is fixed when the host installs it; this
    /// switch can be flipped per manager while a trace-enabled logger stays
    /// quiet for everything else.
    pub trace_pushes: bool,
}

impl PixelConstantsConfig {
    /// Load settings from `path`. A missing file means defaults; any other
    /// I/O or parse failure is reported with the offending path.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to open config file {}", path.display()))
            }
        };
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create config file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush config file {}", path.display()))
    }
}
