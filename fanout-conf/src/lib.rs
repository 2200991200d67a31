#![deny(unsafe_code)]

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use fanout::TreeConfig;

pub use self::logging::{Log, To};
pub use self::options::Options;

pub mod logging;
pub mod options;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Clone)]
pub struct Settings(Arc<Inner>);

#[derive(Debug, Clone, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub log: Log,
    #[serde(default, skip)]
    pub opts: Options,
}

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Settings {
    fn new(opts: Options) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("/etc/fanout/fanout").required(false))
            .add_source(File::with_name("fanout").required(false))
            .add_source(
                config::Environment::with_prefix("fanout")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(cfg) = opts.cfg_name.as_ref() {
            builder = builder.add_source(File::with_name(cfg).required(true));
        }

        Self::build(builder, opts)
    }

    fn build(builder: ConfigBuilder<DefaultState>, opts: Options) -> Result<Self> {
        let mut inner: Inner = builder.build()?.try_deserialize()?;

        //Command line configuration overriding file configuration
        if let Some(batch_capacity) = opts.batch_capacity {
            inner.tree.batch_capacity = batch_capacity;
        }
        if let Some(overflow) = opts.overflow {
            inner.tree.overflow = overflow;
        }
        if inner.log.to.file() && inner.log.path().is_none() {
            return Err(anyhow!("log.to is {:?} but log.file is empty", inner.log.to));
        }
        if inner.tree.batch_capacity == 0 || inner.tree.batch_capacity > fanout::MAX_BATCH_CAPACITY {
            return Err(anyhow!(
                "tree.batch_capacity must be within 1..={}, got {}",
                fanout::MAX_BATCH_CAPACITY,
                inner.tree.batch_capacity
            ));
        }

        inner.opts = opts;
        Ok(Self(Arc::new(inner)))
    }

    #[inline]
    pub fn instance() -> &'static Self {
        match SETTINGS.get() {
            Some(c) => c,
            None => {
                unreachable!("Settings not initialized");
            }
        }
    }

    #[inline]
    pub fn init(opts: Options) -> Result<&'static Self> {
        SETTINGS.set(Settings::new(opts)?).map_err(|_| anyhow!("Settings init failed"))?;
        SETTINGS.get().ok_or_else(|| anyhow!("Settings init failed"))
    }

    #[inline]
    pub fn logs() -> Result<()> {
        let cfg = Self::instance();
        log::debug!("Config info is {:?}", cfg.0);
        log::info!("tree.batch_capacity is {}", cfg.tree.batch_capacity);
        log::info!("tree.overflow is {}", cfg.tree.overflow);
        log::info!("log.to is {:?}, log.level is {}", cfg.log.to, cfg.log.level.as_str());
        Ok(())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Settings ...")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use config::FileFormat;

    use fanout::OverflowPolicy;

    use super::*;

    fn from_toml(toml: &str, opts: Options) -> Result<Settings> {
        Settings::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)), opts)
    }

    #[test]
    fn test_defaults() {
        let s = from_toml("", Options::default()).unwrap();
        assert_eq!(s.tree.batch_capacity, 64);
        assert_eq!(s.tree.overflow, OverflowPolicy::Drain);
        assert_eq!(s.log.to, To::Console);
        assert_eq!(s.log.level, slog::Level::Info);
        assert_eq!(s.log.path(), Some(PathBuf::from("/var/log/fanout/fanout.log")));
    }

    #[test]
    fn test_toml() {
        let s = from_toml(
            r#"
            [tree]
            batch_capacity = 16
            overflow = "reject"

            [log]
            to = "both"
            level = "debug"
            dir = "/tmp/"
            file = "t.log"
            "#,
            Options::default(),
        )
        .unwrap();
        assert_eq!(s.tree.batch_capacity, 16);
        assert_eq!(s.tree.overflow, OverflowPolicy::Reject);
        assert!(s.log.to.file() && s.log.to.console());
        assert_eq!(s.log.level, slog::Level::Debug);
        assert_eq!(s.log.path(), Some(PathBuf::from("/tmp/t.log")));

        let s = from_toml("[log]\nlevel = \"WARN\"\nfile = \"\"\n", Options::default()).unwrap();
        assert_eq!(s.log.level, slog::Level::Warning);
        assert_eq!(s.log.path(), None);
        assert!(!s.log.to.file());
    }

    #[test]
    fn test_options_override() {
        let opts = Options { batch_capacity: Some(8), overflow: Some(OverflowPolicy::Reject), ..Default::default() };
        let s = from_toml("[tree]\nbatch_capacity = 16\n", opts).unwrap();
        assert_eq!(s.tree.batch_capacity, 8);
        assert_eq!(s.tree.overflow, OverflowPolicy::Reject);
        assert_eq!(s.opts.batch_capacity, Some(8));
    }

    #[test]
    fn test_invalid() {
        assert!(from_toml("[tree]\nbatch_capacity = 65\n", Options::default()).is_err());
        assert!(from_toml("[tree]\noverflow = \"grow\"\n", Options::default()).is_err());
        let opts = Options { batch_capacity: Some(0), ..Default::default() };
        assert!(from_toml("", opts).is_err());

        assert!(from_toml("[log]\nto = \"everywhere\"\n", Options::default()).is_err());
        assert!(from_toml("[log]\nlevel = \"loud\"\n", Options::default()).is_err());
        assert!(from_toml("[log]\nto = \"file\"\nfile = \"\"\n", Options::default()).is_err());
    }
}
