//! Image downloads against a local HTTP server.

use axum::{http::StatusCode, routing::get, Router};
use listing_audit::testing::png_bytes;
use listing_audit::{FetchError, HttpImageFetcher, ImageFetcher, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn image_routes() -> Router {
    Router::new()
        .route("/car.png", get(|| async { png_bytes(6, 4) }))
        .route("/missing.jpg", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/slow.jpg",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                png_bytes(2, 2)
            }),
        )
}

#[tokio::test]
async fn test_downloads_to_destination() {
    let base = spawn_server(image_routes()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("image_1_0.jpg");

    let fetcher = HttpImageFetcher::new(Duration::from_secs(5)).unwrap();
    let staged = fetcher
        .fetch(&format!("{}/car.png", base), &dest)
        .await
        .unwrap();

    let expected = png_bytes(6, 4);
    assert_eq!(staged.path, dest);
    assert_eq!(staged.bytes_written, expected.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), expected);
}

#[tokio::test]
async fn test_non_success_status_is_failure() {
    let base = spawn_server(image_routes()).await;
    let dir = tempfile::tempdir().unwrap();

    let fetcher = HttpImageFetcher::new(Duration::from_secs(5)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/missing.jpg", base), &dir.path().join("x.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let base = spawn_server(image_routes()).await;
    let dir = tempfile::tempdir().unwrap();

    let fetcher = HttpImageFetcher::new(Duration::from_millis(200)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/slow.jpg", base), &dir.path().join("x.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }));
}

#[tokio::test]
async fn test_retries_server_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/flaky.png",
        get(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StatusCode::SERVICE_UNAVAILABLE)
                } else {
                    Ok(png_bytes(2, 2))
                }
            }
        }),
    );
    let base = spawn_server(app).await;
    let dir = tempfile::tempdir().unwrap();

    let fetcher = HttpImageFetcher::new(Duration::from_secs(5))
        .unwrap()
        .retrying(RetryPolicy::new(2, Duration::from_millis(10)));
    fetcher
        .fetch(&format!("{}/flaky.png", base), &dir.path().join("x.jpg"))
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
