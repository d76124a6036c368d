//! # pymac_bundler
//!
//! Packages a Python application as a macOS `.app` bundle.
//!
//! The crate drives the macOS developer tools (PyInstaller, `lipo`,
//! `codesign`, `hdiutil`, `sips`, `iconutil`, `notarytool`) and does the
//! bookkeeping between them in-process.
//!
//! ## Features
//!
//! - **Per-architecture builds**: PyInstaller run under `arch -x86_64` or `arch -arm64`
//! - **Universal bundles**: two architecture bundles merged file by file with `lipo`
//! - **Signing**: ad-hoc (basic or nested) or a Developer ID with the hardened runtime
//! - **Disk images**: drag-to-install DMG with an `Applications` link
//! - **Notarization**: `notarytool` with a stored keychain profile, plus stapling
//!
//! ## Usage
//!
//! ```bash
//! pymac_bundler -n MyApp -e main.py                  # universal app in dist/universal
//! pymac_bundler -n MyApp -e main.py -m arm64 --dmg   # Apple Silicon app and DMG
//! pymac_bundler -n MyApp -m merge --x64-app a.app --arm64-app b.app
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod error;

// Re-export main types for public API
pub use bundler::{BundleOutcome, BundledArtifact, Bundler, Settings, SettingsBuilder};
pub use cli::Args;
pub use error::{CliError, ConfigError, PackagerError, Result};
