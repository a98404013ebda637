use super::*;
use sha2::{Digest, Sha512};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn sha512_hex(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::from_config(&FetchConfig::default()).unwrap()
}

async fn serve(mock_server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_fetch_and_verify_success() {
    let mock_server = MockServer::start().await;
    let content = b"cobblemon jar bytes";
    serve(&mock_server, "/cobblemon-1.0.jar", content).await;

    let temp_dir = tempdir().unwrap();
    let dest = temp_dir.path().join("cobblemon-1.0.jar");
    let url = format!("{}/cobblemon-1.0.jar", mock_server.uri());

    let verified = fetcher()
        .fetch_and_verify(&url, &dest, &sha512_hex(content))
        .await
        .unwrap();

    assert_eq!(verified.path, dest);
    assert_eq!(verified.size, content.len() as u64);
    assert_eq!(verified.sha512, sha512_hex(content));
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[tokio::test]
async fn test_fetch_and_verify_accepts_uppercase_hash() {
    let mock_server = MockServer::start().await;
    let content = b"iris jar bytes";
    serve(&mock_server, "/iris-1.0.jar", content).await;

    let temp_dir = tempdir().unwrap();
    let dest = temp_dir.path().join("iris-1.0.jar");
    let url = format!("{}/iris-1.0.jar", mock_server.uri());

    let result = fetcher()
        .fetch_and_verify(&url, &dest, &sha512_hex(content).to_uppercase())
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_fetch_and_verify_hash_mismatch_leaves_file_for_caller() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/iris-1.0.jar", b"tampered").await;

    let temp_dir = tempdir().unwrap();
    let dest = temp_dir.path().join("iris-1.0.jar");
    let url = format!("{}/iris-1.0.jar", mock_server.uri());
    let expected = sha512_hex(b"original");

    let err = fetcher().fetch_and_verify(&url, &dest, &expected).await.unwrap_err();
    match err {
        SyncError::HashMismatch { file, expected: want, actual } => {
            assert_eq!(file, dest);
            assert_eq!(want, expected);
            assert_eq!(actual, sha512_hex(b"tampered"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dest.exists());
}

#[tokio::test]
async fn test_fetch_non_success_status_is_fetch_failed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jar"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = tempdir().unwrap();
    let dest = temp_dir.path().join("missing.jar");
    let url = format!("{}/missing.jar", mock_server.uri());

    let err = fetcher().fetch_and_verify(&url, &dest, "00").await.unwrap_err();
    assert!(matches!(err, SyncError::FetchFailed { url: ref failed, .. } if *failed == url));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_timeout_is_fetch_failed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.jar"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let config = FetchConfig::default().with_timeout(Duration::from_secs(1));
    let fetcher = HttpFetcher::from_config(&config).unwrap();
    let temp_dir = tempdir().unwrap();
    let url = format!("{}/slow.jar", mock_server.uri());

    let err = fetcher
        .fetch_and_verify(&url, &temp_dir.path().join("slow.jar"), "00")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "fetch_failed");
}

#[tokio::test]
async fn test_fetch_reports_progress_events() {
    let mock_server = MockServer::start().await;
    let content = b"spark jar bytes";
    serve(&mock_server, "/spark-1.0.jar", content).await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let fetcher = fetcher().with_progress(Arc::new(move |event| sink.lock().unwrap().push(event)));

    let temp_dir = tempdir().unwrap();
    let dest = temp_dir.path().join("spark-1.0.jar");
    let url = format!("{}/spark-1.0.jar", mock_server.uri());
    fetcher.fetch_and_verify(&url, &dest, &sha512_hex(content)).await.unwrap();

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(ProgressEvent::DownloadStarted { .. })));
    assert!(events.contains(&ProgressEvent::DownloadComplete {
        url: url.clone(),
        final_size: content.len() as u64,
    }));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::ValidationComplete {
            file: dest.display().to_string(),
            valid: true,
        })
    );
}
