//! Run-time settings: environment variables first, command-line flags on top.
//!
//! | variable        | flag        | effect                                   |
//! |-----------------|-------------|------------------------------------------|
//! | `MEMSEGS_PAUSE` | `--pause`   | wait for Enter between steps             |
//! | `MEMSEGS_MAP`   | `--map`     | print the sorted segment map at the end  |
//! | `MEMSEGS_LOG`   | `--verbose` | log level (`--verbose` means `debug`)    |

use lazy_static::lazy_static;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

pub const USAGE: &str = "\
usage: memsegs [--pause] [--map] [--verbose] [--help]

  --pause     wait for Enter between steps, so the process can be inspected
  --map       finish with a table of every address sorted from low to high
  --verbose   log allocations and mappings to stderr
  --help      print this message

environment: MEMSEGS_PAUSE, MEMSEGS_MAP (1/true/yes/on), MEMSEGS_LOG (off..trace)";

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownFlag(String),
    BadLogLevel(String),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownFlag(flag) => write!(f, "unknown flag {flag:?}"),
            ConfigError::BadLogLevel(v) => write!(f, "MEMSEGS_LOG: unknown level {v:?}"),
        }
    }
}

/// What the environment asked for, read once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    pub pause: bool,
    pub map: bool,
    pub log_level: Result<LevelFilter, ConfigError>,
}

impl EnvSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let log_level = match lookup("MEMSEGS_LOG") {
            None => Ok(DEFAULT_LOG_LEVEL),
            Some(v) => LevelFilter::from_str(v.trim()).map_err(|_| ConfigError::BadLogLevel(v)),
        };

        Self {
            pause: lookup("MEMSEGS_PAUSE").is_some_and(|v| truthy(&v)),
            map: lookup("MEMSEGS_MAP").is_some_and(|v| truthy(&v)),
            log_level,
        }
    }
}

lazy_static! {
    pub static ref ENV: EnvSettings = EnvSettings::from_lookup(|k| std::env::var(k).ok());
}

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub pause: bool,
    pub map: bool,
    pub log_level: LevelFilter,
    pub help: bool,
}

impl Config {
    pub fn from_env_and_args<I, S>(env: &EnvSettings, args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cfg = Config {
            pause: env.pause,
            map: env.map,
            log_level: DEFAULT_LOG_LEVEL,
            help: false,
        };
        let mut verbose = false;

        for arg in args {
            match arg.as_ref() {
                "--pause" => cfg.pause = true,
                "--map" => cfg.map = true,
                "--verbose" | "-v" => verbose = true,
                "--help" | "-h" => cfg.help = true,
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }

        // Help is printed before any logging happens.
        if cfg.help {
            return Ok(cfg);
        }

        // A bad MEMSEGS_LOG only matters if nothing on the command line overrides it.
        cfg.log_level = if verbose {
            LevelFilter::Debug
        } else {
            env.log_level.clone()?
        };

        Ok(cfg)
    }
}
