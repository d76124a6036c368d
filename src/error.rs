//! Error types for pymac_bundler operations.
//!
//! This module defines the top-level error type with actionable error
//! messages and recovery suggestions. Bundling errors themselves live in
//! [`crate::bundler::Error`].

use crate::bundler::Error as BundlerError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pymac_bundler operations
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Main error type for all pymac_bundler operations
#[derive(Error, Debug)]
pub enum PackagerError {
    /// Bundler errors
    #[error("Bundler error: {0}")]
    Bundler(#[from] BundlerError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },
}

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("Config file not found: {path}")]
    NotFound {
        /// Path that was given
        path: PathBuf,
    },

    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unknown keys
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A value in the config file is out of range
    #[error("Invalid value for '{key}' in config file: {reason}")]
    InvalidValue {
        /// Key name
        key: String,
        /// Reason for the error
        reason: String,
    },
}

impl PackagerError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackagerError::Bundler(BundlerError::MissingTool { tool, .. }) => match tool.as_str() {
                "lipo" | "codesign" | "xcrun" | "iconutil" => vec![
                    "Install the Xcode Command Line Tools: xcode-select --install".to_string(),
                    format!("Verify '{tool}' is on PATH: which {tool}"),
                ],
                "sips" | "hdiutil" | "xattr" | "ditto" | "arch" => vec![
                    format!("'{tool}' ships with macOS; this tool must run on a Mac"),
                    "Check that /usr/bin is on PATH".to_string(),
                ],
                python => vec![
                    format!("Install Python or pass its path with --python (tried '{python}')"),
                    "Install PyInstaller: python3 -m pip install pyinstaller".to_string(),
                ],
            },
            PackagerError::Bundler(BundlerError::MissingInput { what, path }) => vec![
                format!("Check that the {} exists: {}", what, path.display()),
                "Relative paths are resolved against the current directory".to_string(),
            ],
            PackagerError::Bundler(BundlerError::BundleNotProduced(_)) => vec![
                "Review the PyInstaller output above for skipped steps".to_string(),
                "Check that no custom hook or spec option disables the BUNDLE step".to_string(),
            ],
            PackagerError::Bundler(BundlerError::ToolFailed { tool, .. })
                if tool == "pyinstaller" =>
            {
                vec![
                    "Run with --clean to discard PyInstaller's cache".to_string(),
                    "Add modules PyInstaller misses with --hidden-import".to_string(),
                    "Check that the interpreter can run under the requested architecture".to_string(),
                ]
            }
            PackagerError::Bundler(BundlerError::ToolFailed { tool, .. }) if tool == "hdiutil" => {
                vec![
                    "Eject any mounted image with the same volume name".to_string(),
                    "Check free disk space in the output directory".to_string(),
                ]
            }
            PackagerError::Config(ConfigError::Parse { .. }) => vec![
                "Config keys use the long flag names, e.g. output-dir = \"dist\"".to_string(),
            ],
            PackagerError::Cli(CliError::MissingArgument { argument }) => vec![
                format!("Pass --{argument} or set '{argument}' in the config file"),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
