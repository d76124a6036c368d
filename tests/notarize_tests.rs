//! Notarization against a fake `xcrun`.

#![cfg(unix)]

mod common;

use common::{fake_tool, make_bundle};
use pymac_bundler::bundler::platform::macos::notarize::notarize;
use pymac_bundler::bundler::tools::Toolset;
use pymac_bundler::bundler::{Arch, NotarizeSettings, NotarizeReport};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn settings() -> NotarizeSettings {
    NotarizeSettings {
        keychain_profile: "release".into(),
        staple: true,
    }
}

/// `xcrun` that logs its arguments and reports `status` for submissions.
fn xcrun(bin: &Path, log: &Path, status: &str) -> PathBuf {
    fake_tool(
        bin,
        "xcrun",
        &format!(
            "echo \"$*\" >> '{}'\nif [ \"$1\" = notarytool ]; then\n  echo '  id: 1234'\n  echo '  status: {status}'\nfi\nexit 0",
            log.display()
        ),
    )
}

#[tokio::test]
async fn test_disk_image_submitted_directly() {
    let dir = TempDir::new().unwrap();
    let dmg = dir.path().join("Demo-1.0.0.dmg");
    std::fs::write(&dmg, b"image").unwrap();
    let log = dir.path().join("xcrun.log");
    let tools = Toolset::from_paths([("xcrun", xcrun(&dir.path().join("bin"), &log, "Accepted"))]);

    let report = notarize(&dmg, &settings(), &tools).await.unwrap();

    assert_eq!(
        report,
        NotarizeReport {
            accepted: true,
            stapled: true
        }
    );
    let calls = std::fs::read_to_string(&log).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        format!(
            "notarytool submit {} --keychain-profile release --wait",
            dmg.display()
        )
    );
    assert_eq!(calls[1], format!("stapler staple {}", dmg.display()));
}

#[tokio::test]
async fn test_rejected_submission_is_not_stapled() {
    let dir = TempDir::new().unwrap();
    let dmg = dir.path().join("Demo-1.0.0.dmg");
    std::fs::write(&dmg, b"image").unwrap();
    let log = dir.path().join("xcrun.log");
    let tools = Toolset::from_paths([("xcrun", xcrun(&dir.path().join("bin"), &log, "Invalid"))]);

    let report = notarize(&dmg, &settings(), &tools).await.unwrap();

    assert_eq!(report, NotarizeReport::default());
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn test_failed_zip_skips_submission() {
    let dir = TempDir::new().unwrap();
    let bundle = make_bundle(&dir.path().join("build"), Arch::Arm64);
    let bin = dir.path().join("bin");
    let log = dir.path().join("xcrun.log");
    let tools = Toolset::from_paths([
        ("ditto", fake_tool(&bin, "ditto", "echo 'ditto: no space' >&2\nexit 1")),
        ("xcrun", xcrun(&bin, &log, "Accepted")),
    ]);

    let report = notarize(&bundle, &settings(), &tools).await.unwrap();

    assert_eq!(report, NotarizeReport::default());
    assert!(!log.exists());
}

#[tokio::test]
async fn test_bundle_submitted_as_zip_and_stapled_in_place() {
    let dir = TempDir::new().unwrap();
    let bundle = make_bundle(&dir.path().join("build"), Arch::Arm64);
    let bin = dir.path().join("bin");
    let log = dir.path().join("xcrun.log");
    let tools = Toolset::from_paths([
        ("ditto", fake_tool(&bin, "ditto", "for last; do :; done\ntouch \"$last\"")),
        ("xcrun", xcrun(&bin, &log, "Accepted")),
    ]);

    let report = notarize(&bundle, &settings(), &tools).await.unwrap();

    assert!(report.accepted);
    assert!(report.stapled);
    let calls = std::fs::read_to_string(&log).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert!(calls[0].starts_with("notarytool submit "));
    assert!(calls[0].contains("Demo.app.zip"), "{}", calls[0]);
    assert_eq!(calls[1], format!("stapler staple {}", bundle.display()));
}
