use std::path::PathBuf;

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Where log records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum To {
    Off,
    File,
    Console,
    Both,
}

impl To {
    #[inline]
    pub fn file(self) -> bool {
        matches!(self, To::Both | To::File)
    }

    #[inline]
    pub fn console(self) -> bool {
        matches!(self, To::Both | To::Console)
    }
}

/// The `[log]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Log {
    pub to: To,
    #[serde(deserialize_with = "level_from_str")]
    pub level: slog::Level,
    pub dir: PathBuf,
    pub file: String,
}

impl Default for Log {
    fn default() -> Self {
        Self { to: To::Console, level: slog::Level::Info, dir: "/var/log/fanout".into(), file: "fanout.log".into() }
    }
}

impl Log {
    /// Log file path, `None` when no file name is configured.
    #[inline]
    pub fn path(&self) -> Option<PathBuf> {
        if self.file.is_empty() {
            None
        } else {
            Some(self.dir.join(&self.file))
        }
    }
}

/// Accepts slog level names in any case, full or short (`warning`, `WARN`, `debg`).
fn level_from_str<'de, D>(deserializer: D) -> Result<slog::Level, D::Error>
where
    D: Deserializer<'de>,
{
    let level = String::deserialize(deserializer)?;
    level.parse::<slog::Level>().map_err(|_| de::Error::custom(format!("unknown log level `{}`", level)))
}
