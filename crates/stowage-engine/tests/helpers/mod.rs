//! Shared test fixtures: a registry over temp-dir storage plus image bytes.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use stowage_core::{
    FitMode, MemoryFileRepository, RegistryConfig, ScenarioConfig, ScenarioRegistry,
    StorageConfig, Transform, ValidatorConfig,
};
use stowage_engine::UploadService;
use tempfile::TempDir;

pub struct TestEnv {
    pub registry: Arc<ScenarioRegistry>,
    pub repository: Arc<MemoryFileRepository>,
    pub service: UploadService,
    pub root: TempDir,
}

impl TestEnv {
    pub fn storage_dir(&self, folder: &str) -> PathBuf {
        self.root.path().join(folder)
    }

    /// Number of physical files under one scenario's tree.
    pub fn file_count(&self, folder: &str) -> usize {
        fn walk(dir: &std::path::Path, count: &mut usize) {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path, count);
                    } else {
                        *count += 1;
                    }
                }
            }
        }

        let mut count = 0;
        walk(&self.storage_dir(folder), &mut count);
        count
    }
}

fn fs_storage(root: &TempDir, folder: &str) -> StorageConfig {
    StorageConfig::Filesystem {
        root_dir: root.path().join(folder).to_string_lossy().to_string(),
        base_url: format!("http://localhost:3000/uploads/{folder}"),
        shard_depth: 2,
    }
}

fn image_validator() -> ValidatorConfig {
    ValidatorConfig {
        extensions: ["jpg", "jpeg", "png", "svg"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        max_size: Some(50 * 1024 * 1024),
        check_extension_by_mime: true,
    }
}

pub fn preview_transform() -> Transform {
    Transform::new(380, 250, FitMode::Crop).with_2x().with_webp()
}

pub fn env() -> TestEnv {
    let root = TempDir::new().unwrap();

    let mut scenarios = BTreeMap::new();
    scenarios.insert(
        "image".to_string(),
        ScenarioConfig {
            storage: Some(fs_storage(&root, "image")),
            validator: Some(image_validator()),
            thumbnails: BTreeMap::from([("preview".to_string(), preview_transform())]),
            ..ScenarioConfig::default()
        },
    );
    scenarios.insert(
        "archive".to_string(),
        ScenarioConfig {
            storage: Some(fs_storage(&root, "archive")),
            validator: Some(ValidatorConfig {
                extensions: vec!["zip".to_string()],
                max_size: Some(1024 * 1024),
                check_extension_by_mime: false,
            }),
            ..ScenarioConfig::default()
        },
    );
    scenarios.insert(
        "gallery".to_string(),
        ScenarioConfig {
            storage: Some(fs_storage(&root, "gallery")),
            validator: Some(image_validator()),
            save_original_filename: true,
            ..ScenarioConfig::default()
        },
    );
    scenarios.insert(
        "keepsake".to_string(),
        ScenarioConfig {
            storage: Some(fs_storage(&root, "keepsake")),
            keep_files_on_delete: true,
            ..ScenarioConfig::default()
        },
    );
    scenarios.insert(
        "avatar".to_string(),
        ScenarioConfig {
            storage: Some(fs_storage(&root, "avatar")),
            thumbnail: Some(Transform::new(64, 64, FitMode::Crop)),
            ..ScenarioConfig::default()
        },
    );

    let registry = Arc::new(
        ScenarioRegistry::new(RegistryConfig {
            default_storage: Some(fs_storage(&root, "tmp")),
            scenarios,
            ..RegistryConfig::default()
        })
        .unwrap(),
    );

    let repository = Arc::new(MemoryFileRepository::new());
    let service = UploadService::new(registry.clone(), repository.clone());

    TestEnv {
        registry,
        repository,
        service,
        root,
    }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 60, 20]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .unwrap();
    buffer
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([20, 60, 200, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}
