//! Upload pipeline against the filesystem backend.
//!
//! Run with: `cargo test -p fluffy-upload --test filesystem_test`

mod helpers;

use fluffy_storage::create_storage;
use fluffy_upload::{CancellationToken, UploadManifest, UploadOrchestrator};
use helpers::{incoming, test_config};
use tempfile::TempDir;

#[tokio::test]
async fn test_upload_writes_flat_layout_under_roots() {
    let dir = TempDir::new().unwrap();
    let object_root = dir.path().join("object");
    let html_root = dir.path().join("html");
    let object_root_str = object_root.display().to_string();
    let html_root_str = html_root.display().to_string();

    let config = test_config(&[
        ("STORAGE_BACKEND", "filesystem"),
        ("OBJECT_ROOT", object_root_str.as_str()),
        ("HTML_ROOT", html_root_str.as_str()),
    ]);
    let storage = create_storage(&config).await.unwrap();
    let orchestrator = UploadOrchestrator::new(storage, &config);

    let receipt = orchestrator
        .upload(
            &CancellationToken::new(),
            vec![
                incoming("../../etc/passwd", b"root:x:0:0"),
                incoming("photo.jpeg", b"\xff\xd8\xff\xe0"),
            ],
        )
        .await
        .unwrap();

    for entry in &receipt.manifest.uploaded_files {
        let key = entry.raw.strip_prefix("https://i.example.com/").unwrap();
        assert!(!key.contains('/'));
        assert!(object_root.join(key).is_file(), "{} missing", key);
    }
    assert_eq!(receipt.manifest.uploaded_files[0].name, "../../etc/passwd");
    assert!(!dir.path().join("etc").exists());

    let manifest_key = receipt
        .metadata_url
        .strip_prefix("https://i.example.com/")
        .unwrap();
    let manifest: UploadManifest =
        serde_json::from_slice(&std::fs::read(object_root.join(manifest_key)).unwrap()).unwrap();
    assert_eq!(manifest.uploaded_files[1].bytes, 4);

    let details_key = receipt
        .details_url
        .strip_prefix("https://i.example.com/html/")
        .unwrap();
    let page = std::fs::read_to_string(html_root.join(details_key)).unwrap();
    assert!(page.contains("photo.jpeg"));
    assert!(page.contains("<img"));

    // Three objects under the object root, one under the HTML root.
    assert_eq!(std::fs::read_dir(&object_root).unwrap().count(), 3);
    assert_eq!(std::fs::read_dir(&html_root).unwrap().count(), 1);
}
