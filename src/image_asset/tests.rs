use super::{bounded_size, ImageAsset, TransmitFormat};
use crate::error::NamerError;
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn create_test_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]))
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

#[test]
fn test_bounded_size() {
    assert_eq!(bounded_size((2000, 768)), (2000, 768));
    assert_eq!(bounded_size((512, 1024)), (512, 1024));

    // short side must end up <= 768
    assert_eq!(bounded_size((1024, 800)), (983, 768));

    // long side as height rather than width
    assert_eq!(bounded_size((800, 1024)), (768, 983));
}

#[test]
fn test_bounded_size_clamps_both_sides() {
    // 4000x3000 -> long side to 2000 first, then the short side still exceeds 768
    assert_eq!(bounded_size((4000, 3000)), (1024, 768));
    assert_eq!(bounded_size((5000, 500)), (2000, 200));
}

#[test]
fn test_load_png() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_test_png(&temp_dir, "Screenshot 2024-05-24 at 23.53.04.png", 64, 32);

    let asset = ImageAsset::load(&path).unwrap();

    assert_eq!(asset.dimensions(), (64, 32));
    assert_eq!(asset.path, path);
    assert_eq!(asset.raw_len() as u64, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_load_rejects_non_image() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notes.png");
    fs::write(&path, b"definitely not a png").unwrap();

    match ImageAsset::load(&path) {
        Err(NamerError::UnreadableImage { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected UnreadableImage, got {:?}", other),
    }
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = ImageAsset::load(&temp_dir.path().join("gone.png"));
    assert!(matches!(result, Err(NamerError::UnreadableImage { .. })));
}

#[test]
fn test_original_payload_keeps_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_test_png(&temp_dir, "shot.png", 10, 10);

    let asset = ImageAsset::load(&path).unwrap();
    let payload = asset.payload(TransmitFormat::Original).unwrap();

    assert_eq!(payload.bytes, fs::read(&path).unwrap());
    assert_eq!(payload.mime, "image/png");
}

#[test]
fn test_webp_payload_is_resized() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_test_png(&temp_dir, "wide.png", 1024, 800);

    let asset = ImageAsset::load(&path).unwrap();
    let payload = asset.payload(TransmitFormat::WebP).unwrap();

    assert_eq!(payload.mime, "image/webp");
    let decoded = image::load_from_memory_with_format(&payload.bytes, ImageFormat::WebP).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (983, 768));
    assert!(payload.data_url().starts_with("data:image/webp;base64,"));
}
