use hipstr::HipStr;
use std::ffi::OsString;
use std::path::PathBuf;

pub const SEQUENCE_DIR_VAR: &str = "ECMDB_SEQUENCE_DIR";
pub const LOG_LEVEL_VAR: &str = "ECMDB_LOG_LEVEL";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Directory of OEIS b-files consulted after the built-in sequences.
    pub sequence_dir: Option<PathBuf>,
    pub log_level: HipStr<'static>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sequence_dir: None,
            log_level: HipStr::borrowed(DEFAULT_LOG_LEVEL),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let defaults = Config::default();
        Config {
            sequence_dir: lookup(SEQUENCE_DIR_VAR)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .or(defaults.sequence_dir),
            log_level: lookup(LOG_LEVEL_VAR)
                .and_then(|level| level.into_string().ok())
                .filter(|level| !level.is_empty())
                .map(HipStr::from)
                .unwrap_or(defaults.log_level),
        }
    }
}
