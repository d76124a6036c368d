//! Universal merge behavior against fixture bundles.

#![cfg(unix)]

mod common;

use common::{APP_NAME, FakeLipo, make_bundle, symlink, write_file};
use pymac_bundler::bundler::platform::macos::{macho, universal::merge_bundles};
use pymac_bundler::bundler::{Arch, Error, MergeInputs, calculate_sha256};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    inputs: MergeInputs,
    output: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let inputs = MergeInputs {
        x86_64: make_bundle(&dir.path().join("x86_64"), Arch::X86_64),
        arm64: make_bundle(&dir.path().join("arm64"), Arch::Arm64),
    };
    let output = dir.path().join("universal").join(format!("{APP_NAME}.app"));
    Fixture {
        _dir: dir,
        inputs,
        output,
    }
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[tokio::test]
async fn test_mach_o_files_carry_both_architectures() {
    let fx = fixture();
    let report = merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    for rel in [
        "Contents/MacOS/Demo",
        "Contents/Frameworks/libfoo.dylib",
        "Contents/Frameworks/Python.framework/Versions/3.11/Python",
    ] {
        let archs = macho::architectures(&fx.output.join(rel)).await.unwrap();
        assert_eq!(archs, [Arch::X86_64, Arch::Arm64], "{rel}");
    }

    assert_eq!(report.merged, 3);
    assert_eq!(report.identical, 1);
    assert_eq!(report.single_side, 2);
    assert_eq!(report.non_binary, 1);
    assert!(report.fallbacks.is_empty());
}

#[tokio::test]
async fn test_merged_executable_keeps_mode() {
    let fx = fixture();
    merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    let mode = std::fs::metadata(fx.output.join("Contents/MacOS/Demo"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[tokio::test]
async fn test_single_side_and_non_binary_files_copied_verbatim() {
    let fx = fixture();
    merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    let intel_only = "Contents/Frameworks/libintel.dylib";
    assert_eq!(
        read(&fx.output.join(intel_only)),
        read(&fx.inputs.x86_64.join(intel_only))
    );

    let arm_only = "Contents/Frameworks/libarm.dylib";
    assert_eq!(
        read(&fx.output.join(arm_only)),
        read(&fx.inputs.arm64.join(arm_only))
    );

    // Differing non-Mach-O files take the arm64 side.
    let script = "Contents/MacOS/launch.sh";
    assert_eq!(
        read(&fx.output.join(script)),
        read(&fx.inputs.arm64.join(script))
    );

    let helper = "Contents/MacOS/helper";
    assert_eq!(
        read(&fx.output.join(helper)),
        read(&fx.inputs.arm64.join(helper))
    );
    assert_eq!(
        read(&fx.output.join("Contents/Info.plist")),
        read(&fx.inputs.arm64.join("Contents/Info.plist"))
    );
}

#[tokio::test]
async fn test_lipo_failure_falls_back_to_arm64_copy() {
    let fx = fixture();
    let report = merge_bundles(
        &fx.inputs,
        &fx.output,
        APP_NAME,
        &FakeLipo::failing_on(&["libfoo.dylib"]),
    )
    .await
    .unwrap();

    let rel = Path::new("Contents/Frameworks/libfoo.dylib");
    assert_eq!(report.fallbacks, [rel.to_path_buf()]);
    assert_eq!(report.merged, 2);
    assert_eq!(read(&fx.output.join(rel)), read(&fx.inputs.arm64.join(rel)));
    assert_eq!(
        macho::architectures(&fx.output.join(rel)).await.unwrap(),
        [Arch::Arm64]
    );

    let leftovers: Vec<_> = std::fs::read_dir(fx.output.join("Contents/Frameworks"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".universal"))
        .collect();
    assert!(leftovers.is_empty(), "staging files left: {leftovers:?}");
}

#[tokio::test]
async fn test_merge_is_idempotent() {
    let fx = fixture();
    let merger = FakeLipo::default();

    merge_bundles(&fx.inputs, &fx.output, APP_NAME, &merger)
        .await
        .unwrap();
    let first = calculate_sha256(&fx.output).await.unwrap();

    // Stray files from an earlier run must not survive.
    std::fs::write(fx.output.join("Contents/stale.txt"), b"old").unwrap();

    let second_report = merge_bundles(&fx.inputs, &fx.output, APP_NAME, &merger)
        .await
        .unwrap();
    let second = calculate_sha256(&fx.output).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second_report.merged, 3);
    assert!(!fx.output.join("Contents/stale.txt").exists());
}

#[tokio::test]
async fn test_symlinks_preserved_and_x86_64_only_links_recreated() {
    let fx = fixture();
    let report = merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    let framework = fx.output.join("Contents/Frameworks/Python.framework");
    assert_eq!(
        std::fs::read_link(framework.join("Versions/Current")).unwrap(),
        Path::new("3.11")
    );
    assert_eq!(
        std::fs::read_link(framework.join("Python")).unwrap(),
        Path::new("Versions/Current/Python")
    );
    assert_eq!(
        std::fs::read_link(fx.output.join("Contents/Frameworks/libintel.1.dylib")).unwrap(),
        Path::new("libintel.dylib")
    );
    assert_eq!(report.symlink_conflicts, 0);
}

#[tokio::test]
async fn test_conflicting_symlink_targets_keep_arm64() {
    let fx = fixture();
    let link = "Contents/Frameworks/Python.framework/Versions/Current";
    std::fs::remove_file(fx.inputs.x86_64.join(link)).unwrap();
    std::os::unix::fs::symlink("3.10", fx.inputs.x86_64.join(link)).unwrap();

    let report = merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_link(fx.output.join(link)).unwrap(),
        Path::new("3.11")
    );
    assert_eq!(report.symlink_conflicts, 1);
}

#[tokio::test]
async fn test_missing_input_is_reported() {
    let fx = fixture();
    let inputs = MergeInputs {
        x86_64: fx.inputs.x86_64.with_file_name("Missing.app"),
        arm64: fx.inputs.arm64.clone(),
    };

    let err = merge_bundles(&inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingInput { what: "x86_64 bundle", .. }));
    assert!(!fx.output.exists());
}

#[tokio::test]
async fn test_x86_64_file_against_arm64_directory_keeps_arm64() {
    let fx = fixture();
    let extra = "Contents/Frameworks/extra";
    write_file(&fx.inputs.x86_64.join(extra), b"x86_64 file", 0o644);
    write_file(&fx.inputs.arm64.join(extra).join("inner.txt"), b"arm64 inner", 0o644);

    let report = merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    assert_eq!(report.type_conflicts, 1);
    assert!(fx.output.join(extra).is_dir());
    assert_eq!(read(&fx.output.join(extra).join("inner.txt")), b"arm64 inner");
    assert_eq!(report.merged, 3);
}

#[tokio::test]
async fn test_x86_64_directory_against_arm64_file_keeps_arm64() {
    let fx = fixture();
    let extra = "Contents/Frameworks/extra";
    write_file(&fx.inputs.x86_64.join(extra).join("inner.txt"), b"x86_64 inner", 0o644);
    symlink("inner.txt", &fx.inputs.x86_64.join(extra).join("alias"));
    write_file(&fx.inputs.arm64.join(extra), b"arm64 file", 0o644);

    let report = merge_bundles(&fx.inputs, &fx.output, APP_NAME, &FakeLipo::default())
        .await
        .unwrap();

    // The directory itself, the file inside it and the symlink inside it.
    assert_eq!(report.type_conflicts, 3);
    assert!(fx.output.join(extra).is_file());
    assert_eq!(read(&fx.output.join(extra)), b"arm64 file");
    assert_eq!(report.symlink_conflicts, 0);
}
