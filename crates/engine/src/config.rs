//! Store location and tuning parsing
//!
//! A store is named by a path spec: a filesystem path or one of the
//! in-memory sentinels, optionally followed by `#key=value` tuning
//! parameters:
//!
//! ```text
//! *                              in-memory hash store
//! +                              in-memory tree store
//! casket.tch#bnum=100000#mode=wc file-backed hash store
//! casket.tcb#mode=r              file-backed tree store, read-only
//! ```
//!
//! Parameters override the [`StoreConfig`] passed alongside the spec, which
//! may itself come from a TOML file (see [`load_config`]).

use std::fs;
use std::path::{Path, PathBuf};

use tansu_core::{DurabilityMode, Error, LockMode, OpenMode, Result, StoreConfig, StoreKind};

/// Path naming an in-memory hash store
pub const MEMORY_HASH: &str = "*";
/// Path naming an in-memory tree store
pub const MEMORY_TREE: &str = "+";

/// File extension that selects the tree backend when `kind` is not given
pub const TREE_EXTENSION: &str = "tcb";

/// Where a store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Process memory only; nothing survives close
    Memory,
    /// A single file on disk
    File(PathBuf),
}

impl StoreLocation {
    /// File path, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            StoreLocation::Memory => None,
            StoreLocation::File(p) => Some(p),
        }
    }
}

/// Split a path spec into its location and the effective config
///
/// `base` supplies everything the path does not mention. The store kind
/// comes from a `kind` parameter, then the sentinel or file extension,
/// then `base`.
pub fn parse_path_spec(spec: &str, base: &StoreConfig) -> Result<(StoreLocation, StoreConfig)> {
    let mut parts = spec.split('#');
    let raw_path = parts.next().unwrap_or_default();
    if raw_path.is_empty() {
        return Err(Error::invalid("empty store path"));
    }

    let mut config = base.clone();
    let location = match raw_path {
        MEMORY_HASH => {
            config.kind = StoreKind::Hash;
            StoreLocation::Memory
        }
        MEMORY_TREE => {
            config.kind = StoreKind::Tree;
            StoreLocation::Memory
        }
        path => {
            let path = PathBuf::from(path);
            if path.extension().map_or(false, |e| e == TREE_EXTENSION) {
                config.kind = StoreKind::Tree;
            }
            StoreLocation::File(path)
        }
    };

    for param in parts.filter(|p| !p.is_empty()) {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| Error::invalid(format!("malformed parameter '{}'", param)))?;
        apply_param(&mut config, key.trim(), value.trim())?;
    }
    config.validate()?;
    Ok((location, config))
}

fn apply_param(config: &mut StoreConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "kind" | "type" => config.kind = value.parse()?,
        "mode" => apply_mode(config, value)?,
        "bnum" => config.bucket_count = number(key, value)?,
        "apow" => config.alignment_power = number(key, value)?,
        "fpow" => config.free_pool_power = number(key, value)?,
        "rcnum" => config.cache_records = number(key, value)?,
        "lcnum" => config.cache_leaf_nodes = number(key, value)?,
        "ncnum" => config.cache_non_leaf_nodes = number(key, value)?,
        "xmsiz" => config.extra_mapped_memory = number(key, value)?,
        "mutex" => config.mutex_enabled = flag(key, value)?,
        "durability" => {
            config.durability = match value {
                "buffered" => DurabilityMode::Buffered,
                "always" => DurabilityMode::Always,
                other => {
                    return Err(Error::invalid(format!("unknown durability '{}'", other)));
                }
            }
        }
        // compression options of the native format; records are never compressed here
        "opts" => {
            if let Some(bad) = value.chars().find(|c| !"ldbt".contains(*c)) {
                return Err(Error::invalid(format!("unknown opts flag '{}'", bad)));
            }
        }
        other => return Err(Error::invalid(format!("unknown parameter '{}'", other))),
    }
    Ok(())
}

/// Mode characters: `r w c t` plus the lock flags `e` (no lock) and `f`
/// (non-blocking lock)
fn apply_mode(config: &mut StoreConfig, value: &str) -> Result<()> {
    let mut flags = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'e' => config.lock = LockMode::None,
            'f' => config.lock = LockMode::NonBlocking,
            other => flags.push(other),
        }
    }
    config.mode = flags.parse::<OpenMode>()?;
    Ok(())
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid(format!("parameter '{}' expects a number, got '{}'", key, value)))
}

fn flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::invalid(format!(
            "parameter '{}' expects a boolean, got '{}'",
            key, other
        ))),
    }
}

/// Read a [`StoreConfig`] from a TOML file
///
/// Missing fields take their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<StoreConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::invalid(format!(
            "failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let config: StoreConfig = toml::from_str(&content).map_err(|e| {
        Error::invalid(format!(
            "failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}

/// Write `config` to `path` as TOML
pub fn write_config(config: &StoreConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::invalid(format!("failed to serialize config: {}", e)))?;
    fs::write(path, content).map_err(|e| {
        Error::invalid(format!(
            "failed to write config file '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_sentinels() {
        let (loc, cfg) = parse_path_spec("*", &StoreConfig::tree()).unwrap();
        assert_eq!(loc, StoreLocation::Memory);
        assert_eq!(cfg.kind, StoreKind::Hash);

        let (loc, cfg) = parse_path_spec("+#bnum=10", &StoreConfig::default()).unwrap();
        assert_eq!(loc, StoreLocation::Memory);
        assert_eq!(cfg.kind, StoreKind::Tree);
        assert_eq!(cfg.bucket_count, 10);
    }

    #[test]
    fn test_file_params() {
        let (loc, cfg) = parse_path_spec(
            "data/casket.tch#bnum=100000#apow=6#fpow=12#xmsiz=0#mutex=true#mode=wcf",
            &StoreConfig::default(),
        )
        .unwrap();
        assert_eq!(loc.path(), Some(Path::new("data/casket.tch")));
        assert_eq!(cfg.kind, StoreKind::Hash);
        assert_eq!(cfg.bucket_count, 100_000);
        assert_eq!(cfg.alignment_power, 6);
        assert_eq!(cfg.free_pool_power, 12);
        assert_eq!(cfg.extra_mapped_memory, 0);
        assert!(cfg.mutex_enabled);
        assert_eq!(cfg.lock, LockMode::NonBlocking);
        assert!(cfg.mode.write && cfg.mode.create && !cfg.mode.read);
    }

    #[test]
    fn test_tree_extension_and_kind_override() {
        let (_, cfg) = parse_path_spec("x.tcb", &StoreConfig::default()).unwrap();
        assert_eq!(cfg.kind, StoreKind::Tree);
        let (_, cfg) = parse_path_spec("x.tcb#kind=hash", &StoreConfig::default()).unwrap();
        assert_eq!(cfg.kind, StoreKind::Hash);
    }

    #[test]
    fn test_mode_lock_flags() {
        let (_, cfg) = parse_path_spec("x.tch#mode=re", &StoreConfig::default()).unwrap();
        assert_eq!(cfg.lock, LockMode::None);
        assert_eq!(cfg.mode, OpenMode::read_only());
    }

    #[test]
    fn test_bad_params_rejected() {
        let base = StoreConfig::default();
        assert!(parse_path_spec("", &base).is_err());
        assert!(parse_path_spec("x.tch#bnum", &base).is_err());
        assert!(parse_path_spec("x.tch#bnum=lots", &base).is_err());
        assert!(parse_path_spec("x.tch#color=red", &base).is_err());
        assert!(parse_path_spec("x.tch#mode=rc", &base).is_err());
        assert!(parse_path_spec("x.tch#apow=99", &base).is_err());
        assert!(parse_path_spec("x.tch#opts=z", &base).is_err());
        assert!(parse_path_spec("x.tch#opts=ld", &base).is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tansu.toml");
        let cfg = StoreConfig::tree()
            .with_bucket_count(4096)
            .with_mutex(true)
            .with_durability(DurabilityMode::Always);
        write_config(&cfg, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), cfg);
    }

    #[test]
    fn test_toml_defaults_and_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tansu.toml");
        fs::write(&path, "kind = \"tree\"\nmode = \"rw\"\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.kind, StoreKind::Tree);
        assert_eq!(cfg.bucket_count, StoreConfig::default().bucket_count);

        fs::write(&path, "mode = \"q\"\n").unwrap();
        assert!(load_config(&path).is_err());
        assert!(load_config(dir.path().join("missing.toml")).is_err());
    }
}
