//! ICNS icon file creation for macOS applications.
//!
//! A raster source is resized into an `.iconset` directory with `sips` and
//! compiled with `iconutil`. An `.icns` source is used as-is.

use crate::bundler::{
    error::{Context, ErrorExt, Result},
    settings::Settings,
    tools::{Toolset, is_icns, run_tool},
};
use std::path::{Path, PathBuf};

/// Base icon sizes in points. Each is rendered at 1x and 2x.
pub const ICON_BASE_SIZES: [u32; 6] = [16, 32, 64, 128, 256, 512];

/// Smallest source that covers the 512pt @2x slot without upscaling.
const RECOMMENDED_SOURCE_SIZE: u32 = 1024;

/// One image in an `.iconset` directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IconsetEntry {
    /// File name inside the iconset (`icon_32x32@2x.png`)
    pub file_name: String,
    /// Pixel edge length
    pub pixels: u32,
}

/// Lists the iconset files `iconutil` expects, 1x before 2x per size.
pub fn iconset_entries() -> Vec<IconsetEntry> {
    ICON_BASE_SIZES
        .iter()
        .flat_map(|&size| {
            [
                IconsetEntry {
                    file_name: format!("icon_{size}x{size}.png"),
                    pixels: size,
                },
                IconsetEntry {
                    file_name: format!("icon_{size}x{size}@2x.png"),
                    pixels: size * 2,
                },
            ]
        })
        .collect()
}

/// Returns the `.icns` to hand to the packager, converting if needed.
///
/// A raster source is converted to `<Name>.icns` in `output_dir`.
/// Returns `None` when no icon was configured.
pub async fn prepare_icon(
    settings: &Settings,
    tools: &Toolset,
    output_dir: &Path,
) -> Result<Option<PathBuf>> {
    let Some(source) = settings.icon() else {
        return Ok(None);
    };

    if is_icns(source) {
        log::debug!("Using icon {} as-is", source.display());
        return Ok(Some(source.to_path_buf()));
    }

    check_dimensions(source);

    let output = output_dir.join(format!("{}.icns", settings.app_name()));
    convert_to_icns(source, &output, settings.app_name(), tools)
        .await
        .with_context(|| format!("converting {} to .icns", source.display()))?;

    Ok(Some(output))
}

fn check_dimensions(source: &Path) {
    match image::image_dimensions(source) {
        Ok((width, height)) => {
            if width != height {
                log::warn!(
                    "Icon {} is {}x{}; it will be stretched to a square",
                    source.display(),
                    width,
                    height
                );
            } else if width < RECOMMENDED_SOURCE_SIZE {
                log::warn!(
                    "Icon {} is {}px; {}px or larger avoids upscaling",
                    source.display(),
                    width,
                    RECOMMENDED_SOURCE_SIZE
                );
            }
        }
        Err(e) => log::warn!("Could not read icon dimensions of {}: {}", source.display(), e),
    }
}

/// Renders every iconset size from `source` and compiles them into `output`.
pub async fn convert_to_icns(
    source: &Path,
    output: &Path,
    app_name: &str,
    tools: &Toolset,
) -> Result<()> {
    let staging = tempfile::Builder::new()
        .prefix("pymac-icon")
        .tempdir()
        .fs_context("creating temporary directory", std::env::temp_dir())?;
    let iconset = staging.path().join(format!("{app_name}.iconset"));
    tokio::fs::create_dir_all(&iconset)
        .await
        .fs_context("creating iconset directory", &iconset)?;

    for entry in iconset_entries() {
        let size = entry.pixels.to_string();
        let mut command = tools.command("sips")?;
        command
            .arg("-z")
            .arg(&size)
            .arg(&size)
            .arg(source)
            .arg("--out")
            .arg(iconset.join(&entry.file_name));
        run_tool("sips", &mut command).await?;
    }

    let mut command = tools.command("iconutil")?;
    command
        .arg("-c")
        .arg("icns")
        .arg(&iconset)
        .arg("-o")
        .arg(output);
    run_tool("iconutil", &mut command).await?;

    log::info!("Created ICNS file: {}", output.display());
    Ok(())
}
