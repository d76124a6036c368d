#![cfg(unix)]

mod common;

use common::{APP_NAME, make_bundle};
use pymac_bundler::bundler::platform::macos::app::{apply_metadata, info_plist_path, primary_executable};
use pymac_bundler::bundler::{AppSettings, Arch, BuildMode, Error, MergeInputs, Settings, SettingsBuilder};
use std::path::Path;
use tempfile::TempDir;

fn settings(app: AppSettings) -> Settings {
    SettingsBuilder::new()
        .mode(BuildMode::Merge)
        .app(app)
        .merge_inputs(MergeInputs {
            x86_64: "x86_64/Demo.app".into(),
            arm64: "arm64/Demo.app".into(),
        })
        .build()
        .unwrap()
}

fn read_plist(bundle: &Path) -> plist::Dictionary {
    plist::Value::from_file(info_plist_path(bundle))
        .unwrap()
        .into_dictionary()
        .unwrap()
}

fn string<'a>(dict: &'a plist::Dictionary, key: &str) -> Option<&'a str> {
    dict.get(key).and_then(plist::Value::as_string)
}

#[tokio::test]
async fn test_metadata_written_for_universal_bundle() {
    let dir = TempDir::new().unwrap();
    let bundle = make_bundle(dir.path(), Arch::Arm64);
    let settings = settings(AppSettings {
        name: APP_NAME.into(),
        version: "2.4.1".into(),
        bundle_identifier: Some("com.example.demo".into()),
        ..Default::default()
    });

    apply_metadata(&bundle, &settings, None).await.unwrap();

    let dict = read_plist(&bundle);
    assert_eq!(string(&dict, "CFBundleShortVersionString"), Some("2.4.1"));
    assert_eq!(string(&dict, "CFBundleVersion"), Some("2.4.1"));
    assert_eq!(string(&dict, "CFBundleDisplayName"), Some(APP_NAME));
    assert_eq!(string(&dict, "CFBundleName"), Some(APP_NAME));
    assert_eq!(string(&dict, "CFBundleIdentifier"), Some("com.example.demo"));
    assert_eq!(string(&dict, "LSMinimumSystemVersion"), Some("10.13"));
    assert_eq!(
        dict.get("NSHighResolutionCapable").and_then(plist::Value::as_boolean),
        Some(true)
    );
    // Keys the packager wrote are left alone.
    assert_eq!(string(&dict, "CFBundleExecutable"), Some(APP_NAME));
    assert_eq!(string(&dict, "CFBundlePackageType"), Some("APPL"));
}

#[tokio::test]
async fn test_minimum_version_follows_architecture_and_override() {
    let dir = TempDir::new().unwrap();
    let bundle = make_bundle(dir.path(), Arch::Arm64);

    let defaults = settings(AppSettings {
        name: APP_NAME.into(),
        version: "1.0.0".into(),
        ..Default::default()
    });
    apply_metadata(&bundle, &defaults, Some(Arch::Arm64)).await.unwrap();
    let dict = read_plist(&bundle);
    assert_eq!(string(&dict, "LSMinimumSystemVersion"), Some("11.0"));
    assert!(dict.get("CFBundleIdentifier").is_none());

    let pinned = settings(AppSettings {
        name: APP_NAME.into(),
        version: "1.0.0".into(),
        minimum_system_version: Some("12.3".into()),
        ..Default::default()
    });
    apply_metadata(&bundle, &pinned, Some(Arch::Arm64)).await.unwrap();
    assert_eq!(
        string(&read_plist(&bundle), "LSMinimumSystemVersion"),
        Some("12.3")
    );
}

#[tokio::test]
async fn test_missing_plist_is_missing_input() {
    let dir = TempDir::new().unwrap();
    let bundle = dir.path().join("Empty.app");
    std::fs::create_dir_all(bundle.join("Contents")).unwrap();

    let settings = settings(AppSettings {
        name: "Empty".into(),
        version: "1.0.0".into(),
        ..Default::default()
    });
    let err = apply_metadata(&bundle, &settings, None).await.unwrap_err();

    assert!(matches!(err, Error::MissingInput { what: "Info.plist", .. }));
}

#[tokio::test]
async fn test_primary_executable_lookup() {
    let dir = TempDir::new().unwrap();
    let bundle = make_bundle(dir.path(), Arch::X86_64);

    assert_eq!(
        primary_executable(&bundle, APP_NAME).await.unwrap(),
        Some(Path::new("Contents/MacOS").join(APP_NAME))
    );
    // Several candidates and none named after the app.
    assert_eq!(primary_executable(&bundle, "Other").await.unwrap(), None);

    let lone = dir.path().join("Lone.app");
    common::write_file(&lone.join("Contents/MacOS/launcher"), b"#!/bin/sh\n", 0o755);
    assert_eq!(
        primary_executable(&lone, "Lone").await.unwrap(),
        Some(Path::new("Contents/MacOS/launcher").to_path_buf())
    );
}
