//! Fixtures shared by the integration tests: fake Mach-O files, fake
//! bundles and an in-process fat merger.

#![allow(dead_code)]

use pymac_bundler::bundler::{Arch, Error, FatMerger, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "Demo";

const FAT_MAGIC: u32 = 0xcafe_babe;
const SLICE_ALIGN: u32 = 12;

/// Minimal thin 64-bit Mach-O executable for `arch`, followed by `payload`.
pub fn thin_macho(arch: Arch, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for word in [0xfeed_facf_u32, arch.cpu_type(), 0, 2, 0, 0, 0, 0] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes.resize(64, 0);
    bytes.extend_from_slice(payload);
    bytes
}

/// Fat file holding `slices` (each a thin Mach-O), aligned like `lipo` does.
pub fn fat_macho(slices: &[Vec<u8>]) -> Vec<u8> {
    let align = 1usize << SLICE_ALIGN;
    let mut header = Vec::new();
    header.extend_from_slice(&FAT_MAGIC.to_be_bytes());
    header.extend_from_slice(&(slices.len() as u32).to_be_bytes());

    let mut offset = align;
    let mut body = Vec::new();
    for slice in slices {
        let cpu_type = u32::from_le_bytes(slice[4..8].try_into().unwrap());
        let cpu_subtype = u32::from_le_bytes(slice[8..12].try_into().unwrap());
        for word in [cpu_type, cpu_subtype, offset as u32, slice.len() as u32, SLICE_ALIGN] {
            header.extend_from_slice(&word.to_be_bytes());
        }

        body.resize(offset - align, 0);
        body.extend_from_slice(slice);
        offset += slice.len().div_ceil(align) * align;
    }

    header.resize(align, 0);
    header.extend_from_slice(&body);
    header
}

/// Writes `contents` at `path`, creating parents, with the given mode.
pub fn write_file(path: &Path, contents: &[u8], mode: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
}

/// Writes an executable shell script `name` into `dir` and returns its path.
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    write_file(&path, format!("#!/bin/sh\n{body}\n").as_bytes(), 0o755);
    path
}

pub fn symlink(target: &str, link: &Path) {
    std::fs::create_dir_all(link.parent().unwrap()).unwrap();
    std::os::unix::fs::symlink(target, link).unwrap();
}

pub fn info_plist(name: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleExecutable</key>
    <string>{name}</string>
    <key>CFBundleName</key>
    <string>{name}</string>
    <key>CFBundlePackageType</key>
    <string>APPL</string>
    <key>CFBundleShortVersionString</key>
    <string>0.0.0</string>
</dict>
</plist>
"#
    )
    .into_bytes()
}

/// Builds a PyInstaller-shaped bundle for `arch` under `root`.
///
/// Layout (relative to `<root>/Demo.app`):
/// - `Contents/MacOS/Demo` - main executable, arch-specific
/// - `Contents/MacOS/helper` - executable, identical on both sides
/// - `Contents/MacOS/launch.sh` - executable script, differs per side
/// - `Contents/Resources/data.txt` - plain data, identical
/// - `Contents/Frameworks/libfoo.dylib` - arch-specific library
/// - `Contents/Frameworks/Python.framework/Versions/3.11/Python` - no exec bit
/// - `Contents/Frameworks/Python.framework/{Python,Versions/Current}` - symlinks
/// - a library present only on this side
pub fn make_bundle(root: &Path, arch: Arch) -> PathBuf {
    let bundle = root.join(format!("{APP_NAME}.app"));
    let contents = bundle.join("Contents");
    let tag = arch.target_arch().as_bytes();

    write_file(&contents.join("Info.plist"), &info_plist(APP_NAME), 0o644);
    write_file(
        &contents.join("MacOS").join(APP_NAME),
        &thin_macho(arch, b"main"),
        0o755,
    );
    write_file(
        &contents.join("MacOS/helper"),
        &thin_macho(Arch::Arm64, b"same on both sides"),
        0o755,
    );
    write_file(
        &contents.join("MacOS/launch.sh"),
        &[b"#!/bin/sh\n# ".as_slice(), tag].concat(),
        0o755,
    );
    write_file(&contents.join("Resources/data.txt"), b"shared data", 0o644);
    write_file(
        &contents.join("Frameworks/libfoo.dylib"),
        &thin_macho(arch, b"libfoo"),
        0o644,
    );

    let framework = contents.join("Frameworks/Python.framework");
    write_file(
        &framework.join("Versions/3.11/Python"),
        &thin_macho(arch, b"python"),
        0o644,
    );
    symlink("3.11", &framework.join("Versions/Current"));
    symlink("Versions/Current/Python", &framework.join("Python"));

    match arch {
        Arch::X86_64 => {
            write_file(
                &contents.join("Frameworks/libintel.dylib"),
                &thin_macho(arch, b"intel only"),
                0o644,
            );
            symlink("libintel.dylib", &contents.join("Frameworks/libintel.1.dylib"));
        }
        Arch::Arm64 => write_file(
            &contents.join("Frameworks/libarm.dylib"),
            &thin_macho(arch, b"arm only"),
            0o644,
        ),
    }

    bundle
}

/// In-process stand-in for `lipo -create`.
///
/// Writes a real fat header around both inputs. Paths whose file name is
/// listed in `fail_on` fail instead, leaving a partial file behind.
#[derive(Debug, Default)]
pub struct FakeLipo {
    pub fail_on: Vec<String>,
}

impl FakeLipo {
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_on: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl FatMerger for FakeLipo {
    async fn create_fat(&self, x86_64: &Path, arm64: &Path, output: &Path) -> Result<()> {
        let name = x86_64.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail_on.contains(&name) {
            std::fs::write(output, b"partial")?;
            return Err(Error::GenericError(format!(
                "fatal error: lipo: {name} have the same architectures"
            )));
        }

        let slices = [std::fs::read(x86_64)?, std::fs::read(arm64)?];
        std::fs::write(output, fat_macho(&slices))?;
        Ok(())
    }
}
