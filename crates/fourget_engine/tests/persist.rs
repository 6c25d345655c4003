use std::fs;

use fourget_engine::{ensure_output_dir, AtomicFileWriter, FsPersistence, Persistence};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("thread.json", b"hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "thread.json");
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("thread.json", b"world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("thread.json", b"data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("thread.json").exists());
}

#[tokio::test]
async fn write_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("4chan - g - 1").join("thread.json");

    FsPersistence.write(&target, b"{}").await.unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"{}");
}

#[tokio::test]
async fn streamed_write_lands_in_place_and_truncates() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("nested").join("clip.webm");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"stale content that is longer").unwrap();

    let mut writer = FsPersistence.create(&target).await.unwrap();
    writer.append(b"new ").await.unwrap();
    writer.append(b"bytes").await.unwrap();
    writer.finish().await.unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"new bytes");
    let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("clip.webm")]);
}
