use std::fs;
use std::path::Path;

use telegram_analytics::discovery::{find_image_files, find_json_files};

fn seed_file(root: &Path, relative: &str) {
    let path = root.join(relative);
    let parent = path.parent().expect("parent dir");
    fs::create_dir_all(parent).expect("create parent dir");
    fs::write(&path, b"{}").expect("write file");
}

#[test]
fn finds_json_and_images_separately() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();

    seed_file(root, "2024-07-10/chemed/messages.json");
    seed_file(root, "2024-07-10/chemed/photo_1.jpg");
    seed_file(root, "2024-07-11/lobelia4cosmetics/messages.json");
    seed_file(root, "2024-07-11/lobelia4cosmetics/photo_2.jpg");

    let json = find_json_files(root);
    let images = find_image_files(root);

    assert_eq!(json.len(), 2);
    assert_eq!(images.len(), 2);
    assert!(json.iter().all(|p| p.extension().is_some_and(|e| e == "json")));
    assert!(images.iter().all(|p| p.extension().is_some_and(|e| e == "jpg")));
}

#[test]
fn ignores_files_outside_the_expected_depth() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();

    // Too shallow and too deep; neither matches the layout.
    seed_file(root, "stray.json");
    seed_file(root, "2024-07-10/stray.json");
    seed_file(root, "2024-07-10/chemed/nested/stray.json");
    seed_file(root, "2024-07-10/chemed/messages.json");

    let json = find_json_files(root);
    assert_eq!(json.len(), 1);
    assert!(json[0].ends_with("2024-07-10/chemed/messages.json"));
}

#[test]
fn missing_root_is_an_empty_result() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path().join("never-created");

    assert!(find_json_files(&root).is_empty());
    assert!(find_image_files(&root).is_empty());
}
