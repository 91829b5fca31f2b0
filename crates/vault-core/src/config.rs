use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/vault/config.toml`.
///
/// Tunables for the segmented HTTP reader (C3) and piece geometry (C2).
/// Per-operation overrides (e.g. a caller-supplied piece size) always win
/// over these defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Number of parallel range workers per `SegmentedHttpReader`.
    pub default_segments: usize,
    /// Sliding window size as a multiple of `default_segments`: the reader
    /// keeps `buffer_size_factor * default_segments` pieces admitted ahead
    /// of the read cursor.
    pub buffer_size_factor: usize,
    /// Pieces per work group pulled by a worker in one queue pop.
    pub group_size: usize,
    /// Lower bound (log2) on the automatically chosen piece size.
    pub min_piece_size_log2: u32,
    /// Upper bound (log2) on the automatically chosen piece size.
    pub max_piece_size_log2: u32,
    /// Target ceiling on piece count used to pick a piece size.
    pub max_piece_count: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_segments: 6,
            buffer_size_factor: 3,
            group_size: 100,
            min_piece_size_log2: 20,
            max_piece_size_log2: 28,
            max_piece_count: 1000,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vault")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VaultConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VaultConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VaultConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = VaultConfig::default();
        assert_eq!(cfg.default_segments, 6);
        assert_eq!(cfg.buffer_size_factor, 3);
        assert_eq!(cfg.group_size, 100);
        assert_eq!(cfg.min_piece_size_log2, 20);
        assert_eq!(cfg.max_piece_size_log2, 28);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = VaultConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: VaultConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.default_segments, cfg.default_segments);
        assert_eq!(parsed.group_size, cfg.group_size);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            default_segments = 4
            buffer_size_factor = 2
            group_size = 50
            min_piece_size_log2 = 18
            max_piece_size_log2 = 26
            max_piece_count = 500
        "#;
        let cfg: VaultConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.default_segments, 4);
        assert_eq!(cfg.group_size, 50);
        assert_eq!(cfg.max_piece_count, 500);
    }
}
