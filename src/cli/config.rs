//! Optional TOML configuration file.
//!
//! Keys mirror the long command line flags:
//!
//! ```toml
//! name = "Key Manager"
//! entry = "src/main.py"
//! icon = "assets/icon.png"
//! output-dir = "dist"
//! bundle-id = "com.example.keymanager"
//! add-data = ["assets:assets"]
//! hidden-import = ["PyQt5.sip"]
//! sign = "strong"
//! dmg = true
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::bundler::BuildMode;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Values read from a configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Application name
    pub name: Option<String>,
    /// Entry script
    pub entry: Option<PathBuf>,
    /// Intel bundle (merge mode)
    pub x64_app: Option<PathBuf>,
    /// Apple Silicon bundle (merge mode)
    pub arm64_app: Option<PathBuf>,
    /// Operating mode
    pub mode: Option<BuildMode>,
    /// Icon source
    pub icon: Option<PathBuf>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    /// Bundle identifier
    pub bundle_id: Option<String>,
    /// Application version
    pub app_version: Option<String>,
    /// Console build request; rejected when true
    pub console: Option<bool>,
    /// `SOURCE:DEST` data mappings
    #[serde(default)]
    pub add_data: Vec<String>,
    /// Hidden imports
    #[serde(default)]
    pub hidden_import: Vec<String>,
    /// Signing mode or identity
    pub sign: Option<String>,
    /// Entitlements plist
    pub entitlements: Option<PathBuf>,
    /// Build a disk image
    pub dmg: Option<bool>,
    /// Disk image volume name
    pub volume_name: Option<String>,
    /// Notarization keychain profile
    pub notarize_profile: Option<String>,
    /// Staple after notarization
    pub staple: Option<bool>,
    /// Minimum macOS version
    pub min_macos: Option<String>,
    /// Python interpreter
    pub python: Option<String>,
    /// Clean PyInstaller cache
    pub clean: Option<bool>,
}

impl FileConfig {
    /// Loads and parses a configuration file.
    ///
    /// Path-valued keys come back resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses configuration text without resolving paths.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.entry,
            &mut self.x64_app,
            &mut self.arm64_app,
            &mut self.icon,
            &mut self.output_dir,
            &mut self.entitlements,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }

        for mapping in &mut self.add_data {
            if let Some((source, dest)) = mapping.rsplit_once(':')
                && !source.is_empty()
                && Path::new(source).is_relative()
            {
                *mapping = format!("{}:{}", base.join(source).display(), dest);
            }
        }
    }
}
