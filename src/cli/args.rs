//! Command line argument parsing and validation.
//!
//! Flags override values from the optional `--config` file, which in turn
//! override built-in defaults.

use crate::bundler::{
    AppSettings, BuildMode, DataMapping, DmgSettings, MergeInputs, NotarizeSettings,
    PackagerSettings, Settings, SettingsBuilder, SigningMode, SigningSettings,
};
use crate::cli::config::FileConfig;
use crate::error::{CliError, ConfigError, Result};
use clap::Parser;
use std::path::PathBuf;

/// Default application version.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Default Python interpreter.
pub const DEFAULT_PYTHON: &str = "python3";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Package a Python application as a macOS .app bundle
#[derive(Parser, Debug)]
#[command(
    name = "pymac_bundler",
    version,
    about = "Package a Python application as a macOS .app bundle",
    long_about = "Package a Python application as a macOS .app bundle, optionally \
universal (Intel + Apple Silicon), signed, in a disk image and notarized.

Usage:
  pymac_bundler -n MyApp -e main.py
  pymac_bundler -n MyApp -e main.py -m arm64 --icon icon.png --dmg
  pymac_bundler -n MyApp -m merge --x64-app dist/x86_64/MyApp.app --arm64-app dist/arm64/MyApp.app"
)]
pub struct Args {
    /// Application name (bundle and executable name)
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Python entry script
    #[arg(short = 'e', long, value_name = "FILE")]
    pub entry: Option<PathBuf>,

    /// Existing Intel bundle (merge mode)
    #[arg(long = "x64-app", value_name = "DIR")]
    pub x64_app: Option<PathBuf>,

    /// Existing Apple Silicon bundle (merge mode)
    #[arg(long = "arm64-app", value_name = "DIR")]
    pub arm64_app: Option<PathBuf>,

    /// Architectures to build [default: both]
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<BuildMode>,

    /// Application icon (.icns or any image sips can read)
    #[arg(short = 'i', long, value_name = "FILE")]
    pub icon: Option<PathBuf>,

    /// Output directory [default: dist]
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Bundle identifier (e.g. com.example.myapp)
    #[arg(long = "bundle-id", value_name = "ID")]
    pub bundle_id: Option<String>,

    /// Application version [default: 1.0.0]
    #[arg(long = "app-version", value_name = "VERSION")]
    pub app_version: Option<String>,

    /// Build a console application (rejected: PyInstaller only produces
    /// a .app bundle for windowed builds)
    #[arg(long)]
    pub console: bool,

    /// Extra data to bundle, SOURCE:DEST (repeatable)
    #[arg(long = "add-data", value_name = "SRC:DEST")]
    pub add_data: Vec<DataMapping>,

    /// Module PyInstaller cannot discover (repeatable)
    #[arg(long = "hidden-import", value_name = "MODULE")]
    pub hidden_import: Vec<String>,

    /// Signing: none, basic, strong, or a certificate identity [default: basic]
    #[arg(long, value_name = "MODE")]
    pub sign: Option<SigningMode>,

    /// Entitlements plist for identity signing
    #[arg(long, value_name = "FILE")]
    pub entitlements: Option<PathBuf>,

    /// Create a disk image
    #[arg(long)]
    pub dmg: bool,

    /// Disk image volume name [default: application name]
    #[arg(long = "volume-name", value_name = "NAME")]
    pub volume_name: Option<String>,

    /// Notarize with this notarytool keychain profile
    #[arg(long = "notarize-profile", value_name = "PROFILE")]
    pub notarize_profile: Option<String>,

    /// Staple the notarization ticket
    #[arg(long)]
    pub staple: bool,

    /// Minimum macOS version [default: 10.13 Intel/universal, 11.0 arm64]
    #[arg(long = "min-macos", value_name = "VERSION", env = "MACOSX_DEPLOYMENT_TARGET")]
    pub min_macos: Option<String>,

    /// Python interpreter with PyInstaller installed [default: python3]
    #[arg(long, value_name = "PATH")]
    pub python: Option<String>,

    /// Clear PyInstaller's cache before building
    #[arg(long)]
    pub clean: bool,

    /// TOML file with default values for these flags
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Loads the config file, if any, and builds the settings.
    pub fn into_settings(self) -> Result<Settings> {
        let config = match self.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        self.merge_with(config)
    }

    /// Builds the settings from these flags layered over `config`.
    pub fn merge_with(self, config: FileConfig) -> Result<Settings> {
        let name = self
            .name
            .or(config.name)
            .ok_or_else(|| CliError::MissingArgument {
                argument: "name".to_string(),
            })?;
        let mode = self.mode.or(config.mode).unwrap_or_default();

        if self.console || config.console.unwrap_or(false) {
            return Err(CliError::InvalidArguments {
                reason: "--console is not supported: PyInstaller only builds a .app bundle \
                         for windowed applications"
                    .to_string(),
            }
            .into());
        }

        let entry = self.entry.or(config.entry);
        if mode.runs_packager() && entry.is_none() {
            return Err(CliError::MissingArgument {
                argument: "entry".to_string(),
            }
            .into());
        }

        let merge_inputs = if mode == BuildMode::Merge {
            let x86_64 = self.x64_app.or(config.x64_app);
            let arm64 = self.arm64_app.or(config.arm64_app);
            match (x86_64, arm64) {
                (Some(x86_64), Some(arm64)) => Some(MergeInputs { x86_64, arm64 }),
                (None, _) => {
                    return Err(CliError::MissingArgument {
                        argument: "x64-app".to_string(),
                    }
                    .into());
                }
                (_, None) => {
                    return Err(CliError::MissingArgument {
                        argument: "arm64-app".to_string(),
                    }
                    .into());
                }
            }
        } else {
            None
        };

        let minimum_system_version = self.min_macos.or(config.min_macos);
        if let Some(version) = minimum_system_version.as_deref() {
            validate_macos_version(version)?;
        }

        let data = if self.add_data.is_empty() {
            config
                .add_data
                .iter()
                .map(|raw| {
                    raw.parse::<DataMapping>().map_err(|reason| ConfigError::InvalidValue {
                        key: "add-data".to_string(),
                        reason,
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            self.add_data
        };

        let signing_mode = match self.sign {
            Some(mode) => mode,
            None => match config.sign.as_deref() {
                Some(raw) => raw
                    .parse::<SigningMode>()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: "sign".to_string(),
                        reason,
                    })?,
                None => SigningMode::default(),
            },
        };

        let dmg = (self.dmg || config.dmg.unwrap_or(false)).then(|| DmgSettings {
            volume_name: self
                .volume_name
                .or(config.volume_name)
                .unwrap_or_else(|| name.clone()),
        });

        let notarization = self
            .notarize_profile
            .or(config.notarize_profile)
            .map(|keychain_profile| NotarizeSettings {
                keychain_profile,
                staple: self.staple || config.staple.unwrap_or(false),
            });

        let mut builder = SettingsBuilder::new()
            .mode(mode)
            .app(AppSettings {
                name,
                version: self
                    .app_version
                    .or(config.app_version)
                    .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
                bundle_identifier: self.bundle_id.or(config.bundle_id),
                minimum_system_version,
            })
            .packager(PackagerSettings {
                entry,
                python: self
                    .python
                    .or(config.python)
                    .unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
                data,
                hidden_imports: if self.hidden_import.is_empty() {
                    config.hidden_import
                } else {
                    self.hidden_import
                },
                clean: self.clean || config.clean.unwrap_or(false),
            })
            .icon(self.icon.or(config.icon))
            .output_directory(
                self.output_dir
                    .or(config.output_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            )
            .signing(SigningSettings {
                mode: signing_mode,
                entitlements: self.entitlements.or(config.entitlements),
            })
            .dmg(dmg)
            .notarization(notarization);

        if let Some(inputs) = merge_inputs {
            builder = builder.merge_inputs(inputs);
        }

        Ok(builder.build()?)
    }
}

/// Accepts dotted numeric versions such as `11`, `10.13` or `12.0.1`.
fn validate_macos_version(version: &str) -> std::result::Result<(), CliError> {
    let parts: Vec<&str> = version.split('.').collect();
    let valid = parts.len() <= 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));

    if valid {
        Ok(())
    } else {
        Err(CliError::InvalidArguments {
            reason: format!("'{version}' is not a macOS version (expected e.g. 11.0)"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::Arch;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pymac_bundler").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&["-n", "Demo", "-e", "main.py", "--min-macos", "10.15"])
            .merge_with(FileConfig::default())
            .unwrap();

        assert_eq!(settings.mode(), BuildMode::Both);
        assert_eq!(settings.version_string(), DEFAULT_VERSION);
        assert_eq!(settings.packager().python, "python3");
        assert_eq!(settings.output_directory(), std::path::Path::new("dist"));
        assert_eq!(settings.signing().mode, SigningMode::Basic);
        assert!(settings.dmg().is_none());
        assert_eq!(settings.minimum_system_version(Some(Arch::Arm64)), "10.15");
    }

    #[test]
    fn test_missing_name_is_reported() {
        let err = parse(&["-e", "main.py"])
            .merge_with(FileConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::PackagerError::Cli(CliError::MissingArgument { ref argument }) if argument == "name"
        ));
    }

    #[test]
    fn test_console_rejected_before_packaging() {
        let err = parse(&["-n", "Demo", "-e", "main.py", "--console"])
            .merge_with(FileConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::PackagerError::Cli(CliError::InvalidArguments { .. })
        ));

        let config = FileConfig::parse("console = true").unwrap();
        let err = parse(&["-n", "Demo", "-e", "main.py", "-m", "arm64"])
            .merge_with(config)
            .unwrap_err();
        assert!(err.to_string().contains("--console"));

        let config = FileConfig::parse("console = false").unwrap();
        assert!(parse(&["-n", "Demo", "-e", "main.py"]).merge_with(config).is_ok());
    }

    #[test]
    fn test_merge_mode_requires_both_bundles() {
        let err = parse(&["-n", "Demo", "-m", "merge", "--x64-app", "a.app"])
            .merge_with(FileConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("arm64-app"));
    }

    #[test]
    fn test_flags_override_config() {
        let config = FileConfig::parse(
            r#"
            name = "FromConfig"
            entry = "main.py"
            app-version = "2.0.0"
            sign = "none"
            dmg = true
            hidden-import = ["json"]
            "#,
        )
        .unwrap();

        let settings = parse(&["-n", "FromFlags", "--sign", "strong", "--hidden-import", "yaml"])
            .merge_with(config)
            .unwrap();

        assert_eq!(settings.app_name(), "FromFlags");
        assert_eq!(settings.version_string(), "2.0.0");
        assert_eq!(settings.signing().mode, SigningMode::Strong);
        assert_eq!(settings.packager().hidden_imports, ["yaml"]);
        assert_eq!(settings.dmg().unwrap().volume_name, "FromFlags");
    }

    #[test]
    fn test_bad_config_signing_value() {
        let config = FileConfig::parse("sign = \"\"").unwrap();
        let result = parse(&["-n", "Demo", "-e", "main.py"]).merge_with(config);
        assert!(matches!(
            result,
            Err(crate::error::PackagerError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_invalid_min_macos() {
        assert!(validate_macos_version("11.0").is_ok());
        assert!(validate_macos_version("10.13.6").is_ok());
        assert!(validate_macos_version("eleven").is_err());
        assert!(validate_macos_version("11.").is_err());
    }

    #[test]
    fn test_add_data_parsed_by_clap() {
        let args = parse(&["-n", "Demo", "-e", "main.py", "--add-data", "assets:share"]);
        assert_eq!(args.add_data[0].destination, "share");
        assert!(Args::try_parse_from(["pymac_bundler", "--add-data", "nocolon"]).is_err());
    }
}
