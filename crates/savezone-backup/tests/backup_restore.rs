//! Backup, restore and enumeration driven through the Yandex Disk adapter
//! with a scripted transport, plus a local-storage round trip.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use savezone_backup::{BackupRequest, FixedClock, RestoreRequest, Savezone};
use savezone_core::archive;
use savezone_core::codec;
use savezone_core::config::SavezoneConfig;
use savezone_core::config::credentials::{FileTokenStore, TokenStore};
use savezone_core::error::SavezoneError;
use savezone_storage::http::{HttpResponse, Method};
use savezone_storage::mock::MockTransport;
use savezone_storage::registry::StorageRegistry;

struct Harness {
    tmp: TempDir,
    transport: Arc<MockTransport>,
    savezone: Savezone,
}

impl Harness {
    fn new(transport: MockTransport, token: Option<&str>) -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = SavezoneConfig::default_config(tmp.path());
        config.yandex.api_url = "https://disk.test/v1/disk".to_string();
        config.savezone.scratch_dir = Some(tmp.path().join("scratch").display().to_string());

        let store = Arc::new(FileTokenStore::new(&config.token_store_path(tmp.path())));
        if let Some(token) = token {
            store.set("yandex", token).unwrap();
        }
        let transport = Arc::new(transport);
        let registry = StorageRegistry::with_defaults(&config, tmp.path());
        let savezone = Savezone::new(registry, store, transport.clone())
            .with_clock(FixedClock(new_year()))
            .with_restore_dir(&tmp.path().join("restored"));
        Self {
            tmp,
            transport,
            savezone,
        }
    }

    fn write_local(&self, name: &str, content: &[u8]) -> PathBuf {
        let dir = self.tmp.path().join("data");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn scratch_is_empty(&self) -> bool {
        let scratch = self.tmp.path().join("scratch");
        !scratch.exists() || std::fs::read_dir(scratch).unwrap().next().is_none()
    }

    fn restored(&self) -> PathBuf {
        self.tmp.path().join("restored")
    }
}

fn new_year() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn backup_request(local: &Path) -> BackupRequest {
    BackupRequest {
        local_path: local.to_path_buf(),
        remote_path: None,
        storage: "yandex".to_string(),
        token: None,
        overwrite: false,
    }
}

fn restore_request(remote_path: &str) -> RestoreRequest {
    RestoreRequest {
        remote_path: remote_path.to_string(),
        storage: "yd".to_string(),
        target: None,
        token: None,
    }
}

fn dir_item(path: &str) -> serde_json::Value {
    let name = path.rsplit('/').next().unwrap();
    json!({"path": format!("disk:/{path}"), "type": "dir", "name": name})
}

fn listing(items: Vec<serde_json::Value>) -> HttpResponse {
    let total = items.len();
    HttpResponse::from_json(200, json!({"_embedded": {"items": items, "total": total}}))
}

/// Zip bytes holding a single `name` file with `content`.
fn archive_bytes(name: &str, content: &[u8]) -> Vec<u8> {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join(name);
    std::fs::write(&source, content).unwrap();
    let dest = tmp.path().join("out.zip");
    archive::pack(&source, &dest).unwrap();
    std::fs::read(dest).unwrap()
}

#[tokio::test]
async fn backup_uploads_one_version_under_resource_identifier() {
    let transport = MockTransport::new()
        .route(
            Method::GET,
            "/resources/upload?path=savezone/",
            HttpResponse::from_json(200, json!({"href": "https://upload.test/put/1"})),
        )
        .route(Method::PUT, "upload.test/put/1", HttpResponse::empty(201));
    let h = Harness::new(transport, Some("AQAA-token"));
    let local = h.write_local("report.pdf", b"quarterly numbers");

    let backup = h.savezone.backup(&backup_request(&local)).await.unwrap();

    let expected = format!(
        "savezone/{}/01012024000000",
        codec::encode(&local).unwrap()
    );
    assert_eq!(backup.versions.len(), 1);
    assert_eq!(backup.versions[0].path, expected);
    assert_eq!(backup.name, "report.pdf");
    assert_eq!(backup.path, local.to_string_lossy());
    assert_eq!(backup.storage, "Yandex Disk");

    assert_eq!(h.transport.count(&Method::PUT, "upload.test/put/1"), 1);
    assert!(h.scratch_is_empty());

    // The uploaded bytes are an archive holding the original file.
    let put = h
        .transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::PUT)
        .unwrap();
    let uploaded = h.tmp.path().join("uploaded.zip");
    std::fs::write(&uploaded, put.body_bytes().unwrap()).unwrap();
    let unpacked = h.tmp.path().join("unpacked");
    archive::unpack(&uploaded, &unpacked).unwrap();
    assert_eq!(
        std::fs::read(unpacked.join("report.pdf")).unwrap(),
        b"quarterly numbers"
    );
}

#[tokio::test]
async fn backup_to_explicit_target_uses_custom_directory() {
    let transport = MockTransport::new()
        .route(
            Method::GET,
            "/resources/upload?path=savezone-custom/work/q1/report.pdf",
            HttpResponse::from_json(200, json!({"href": "https://upload.test/put/2"})),
        )
        .route(Method::PUT, "upload.test/put/2", HttpResponse::empty(201));
    let h = Harness::new(transport, Some("AQAA-token"));
    let local = h.write_local("report.pdf", b"q1");

    let mut request = backup_request(&local);
    request.remote_path = Some("work/q1".to_string());
    let backup = h.savezone.backup(&request).await.unwrap();

    assert_eq!(backup.versions[0].path, "savezone-custom/work/q1/report.pdf");
}

#[tokio::test]
async fn failed_upload_still_removes_archive() {
    let transport = MockTransport::new().route(
        Method::GET,
        "/resources/upload",
        HttpResponse::from_json(507, json!({"error": "DiskStorageQuotaExhaustedError", "message": "no space"})),
    );
    let h = Harness::new(transport, Some("AQAA-token"));
    let local = h.write_local("report.pdf", b"data");

    let err = h.savezone.backup(&backup_request(&local)).await.unwrap_err();
    assert!(matches!(err, SavezoneError::Remote { status: 507, .. }));
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn backup_without_token_is_auth_error() {
    let h = Harness::new(MockTransport::new(), None);
    let local = h.write_local("report.pdf", b"data");

    let err = h.savezone.backup(&backup_request(&local)).await.unwrap_err();
    assert!(matches!(err, SavezoneError::Auth(_)));
    assert!(h.transport.requests().is_empty());
}

#[tokio::test]
async fn backup_of_missing_file_is_validation_error() {
    let h = Harness::new(MockTransport::new(), Some("AQAA-token"));
    let missing = h.tmp.path().join("nope.pdf");

    let err = h.savezone.backup(&backup_request(&missing)).await.unwrap_err();
    assert!(matches!(err, SavezoneError::Validation(_)));
    assert!(h.transport.requests().is_empty());
}

#[tokio::test]
async fn restore_unpacks_into_restored_directory() {
    let id = codec::encode(Path::new("/tmp/report.pdf")).unwrap();
    let transport = MockTransport::new()
        .route(
            Method::GET,
            &format!("/resources/download?path=savezone/{id}/01012024000000"),
            HttpResponse::from_json(200, json!({"href": "https://download.test/1"})),
        )
        .route(
            Method::GET,
            "download.test/1",
            HttpResponse::new(200, archive_bytes("report.pdf", b"quarterly numbers")),
        );
    let h = Harness::new(transport, Some("AQAA-token"));

    let target = h
        .savezone
        .restore(&restore_request(&format!("savezone/{id}/01012024000000")))
        .await
        .unwrap();

    assert_eq!(target, h.restored().join("report.pdf"));
    assert_eq!(
        std::fs::read(target.join("report.pdf")).unwrap(),
        b"quarterly numbers"
    );
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn restore_without_timestamp_picks_newest_version() {
    let id = codec::encode(Path::new("/tmp/report.pdf")).unwrap();
    let transport = MockTransport::new()
        .route(
            Method::GET,
            &format!("/resources?path=savezone/{id}&"),
            listing(vec![
                dir_item(&format!("savezone/{id}/01012024000000")),
                dir_item(&format!("savezone/{id}/15032024120000")),
            ]),
        )
        .route(
            Method::GET,
            "/resources/download",
            HttpResponse::from_json(200, json!({"href": "https://download.test/2"})),
        )
        .route(
            Method::GET,
            "download.test/2",
            HttpResponse::new(200, archive_bytes("report.pdf", b"march")),
        );
    let h = Harness::new(transport, Some("AQAA-token"));

    let target = h.savezone.restore(&restore_request(&id)).await.unwrap();

    assert_eq!(std::fs::read(target.join("report.pdf")).unwrap(), b"march");
    assert_eq!(
        h.transport.count(&Method::GET, "/resources/download?path=savezone/"),
        1
    );
    assert_eq!(h.transport.count(&Method::GET, "15032024120000"), 1);
}

#[tokio::test]
async fn restore_onto_existing_target_is_conflict() {
    let id = codec::encode(Path::new("/tmp/report.pdf")).unwrap();
    let h = Harness::new(MockTransport::new(), Some("AQAA-token"));
    std::fs::create_dir_all(h.restored().join("report.pdf")).unwrap();

    let err = h
        .savezone
        .restore(&restore_request(&format!("{id}/01012024000000")))
        .await
        .unwrap_err();
    assert!(matches!(err, SavezoneError::Conflict(_)));
    assert_eq!(h.transport.count(&Method::GET, "/resources/download"), 0);
}

#[tokio::test]
async fn restore_of_corrupt_archive_leaves_no_target_behind() {
    let id = codec::encode(Path::new("/tmp/report.pdf")).unwrap();
    let transport = MockTransport::new()
        .route(
            Method::GET,
            "/resources/download",
            HttpResponse::from_json(200, json!({"href": "https://download.test/3"})),
        )
        .route(
            Method::GET,
            "download.test/3",
            HttpResponse::new(200, "<html>not a zip</html>"),
        );
    let h = Harness::new(transport, Some("AQAA-token"));
    let request = restore_request(&format!("savezone/{id}/01012024000000"));

    let err = h.savezone.restore(&request).await.unwrap_err();
    assert!(matches!(err, SavezoneError::Archive(_)));
    assert!(!h.restored().join("report.pdf").exists());
    assert!(h.scratch_is_empty());

    // A retry fails the same way instead of tripping over a leftover target.
    let err = h.savezone.restore(&request).await.unwrap_err();
    assert!(matches!(err, SavezoneError::Archive(_)));
}

#[tokio::test]
async fn restore_of_malformed_identifier_is_format_error() {
    let h = Harness::new(MockTransport::new(), Some("AQAA-token"));
    let err = h
        .savezone
        .restore(&restore_request("savezone/not base32/01012024000000"))
        .await
        .unwrap_err();
    assert!(matches!(err, SavezoneError::Format(_)));
}

#[tokio::test]
async fn get_backups_skips_entries_that_fail() {
    let good = codec::encode(Path::new("/home/u/report.pdf")).unwrap();
    let unlisted = codec::encode(Path::new("/home/u/notes.txt")).unwrap();
    let transport = MockTransport::new()
        .route(
            Method::GET,
            "/resources?path=savezone&",
            listing(vec![
                dir_item(&format!("savezone/{good}")),
                dir_item("savezone/garbage-entry"),
                dir_item(&format!("savezone/{unlisted}")),
            ]),
        )
        .route(
            Method::GET,
            &format!("/resources?path=savezone/{good}&"),
            listing(vec![
                dir_item(&format!("savezone/{good}/01012024000000")),
                dir_item(&format!("savezone/{good}/02012024000000")),
            ]),
        )
        .route(
            Method::GET,
            &format!("/resources?path=savezone/{unlisted}&"),
            HttpResponse::from_json(500, json!({"message": "internal"})),
        );
    let h = Harness::new(transport, Some("AQAA-token"));

    let backups = h.savezone.get_backups("yandex", None).await.unwrap();

    assert_eq!(backups.len(), 1);
    let backup = &backups[0];
    assert_eq!(backup.name, "report.pdf");
    assert_eq!(backup.path, "/home/u/report.pdf");
    let versions: Vec<&str> = backup.versions.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(versions, vec!["02012024000000", "01012024000000"]);
}

#[tokio::test]
async fn get_backups_without_base_directory_is_empty() {
    let transport = MockTransport::new().route(
        Method::GET,
        "/resources?path=savezone&",
        HttpResponse::from_json(404, json!({"error": "DiskNotFoundError", "message": "not found"})),
    );
    let h = Harness::new(transport, Some("AQAA-token"));

    assert!(h.savezone.get_backups("yandex", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_backups_propagates_other_failures() {
    let transport = MockTransport::new().route(
        Method::GET,
        "/resources?path=savezone&",
        HttpResponse::from_json(401, json!({"error": "UnauthorizedError", "message": "bad token"})),
    );
    let h = Harness::new(transport, Some("AQAA-token"));

    let err = h.savezone.get_backups("yandex", None).await.unwrap_err();
    assert!(matches!(err, SavezoneError::Remote { status: 401, .. }));
}

#[tokio::test]
async fn unknown_storage_is_reported() {
    let h = Harness::new(MockTransport::new(), Some("AQAA-token"));
    let err = h.savezone.meta("dropbox", None).await.unwrap_err();
    assert!(matches!(err, SavezoneError::ProviderNotFound(_)));
}

#[tokio::test]
async fn local_storage_round_trip() {
    let h = Harness::new(MockTransport::new(), None);
    let local = h.write_local("notes", b"");
    std::fs::remove_file(&local).unwrap();
    std::fs::create_dir_all(local.join("sub")).unwrap();
    std::fs::write(local.join("sub/a.txt"), b"alpha").unwrap();

    let mut request = backup_request(&local);
    request.storage = "local".to_string();
    let backup = h.savezone.backup(&request).await.unwrap();
    assert_eq!(backup.storage, "Local Storage");

    let backups = h.savezone.get_backups("fs", None).await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].name, "notes");
    assert_eq!(backups[0].versions[0].name, "01012024000000");

    let mut restore = restore_request(&backup.versions[0].path);
    restore.storage = "local".to_string();
    let target = h.savezone.restore(&restore).await.unwrap();
    assert_eq!(
        std::fs::read(target.join("notes/sub/a.txt")).unwrap(),
        b"alpha"
    );

    let meta = h.savezone.meta("local", None).await.unwrap();
    assert_eq!(meta.used_space, meta.total_space);
    assert!(h.transport.requests().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn backup_of_symlink_is_named_after_the_link() {
    let h = Harness::new(MockTransport::new(), None);
    let real = h.write_local("real.pdf", b"linked content");
    let link = real.with_file_name("link.pdf");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let mut request = backup_request(&link);
    request.storage = "local".to_string();
    let backup = h.savezone.backup(&request).await.unwrap();

    assert_eq!(backup.name, "link.pdf");
    assert_eq!(backup.path, link.to_string_lossy());
    assert!(
        backup.versions[0]
            .path
            .contains(&codec::encode(&link).unwrap())
    );

    let mut restore = restore_request(&backup.versions[0].path);
    restore.storage = "local".to_string();
    let target = h.savezone.restore(&restore).await.unwrap();
    assert_eq!(target, h.restored().join("link.pdf"));
    assert_eq!(
        std::fs::read(target.join("link.pdf")).unwrap(),
        b"linked content"
    );
}
