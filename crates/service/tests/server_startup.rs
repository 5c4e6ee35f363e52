use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Config with every path inside `dir` and the status server on `port`
fn config_in(dir: &Path, port: u16) -> String {
    format!(
        r#"
[files]
source_dir = "{source}"
archive_dir = "{archive}"

[storage]
path = "{db}"

[http]
enabled = true
host = "127.0.0.1"
port = {port}
"#,
        source = dir.join("cdr").display(),
        archive = dir.join("cdr_processed").display(),
        db = dir.join("cdr.db").display(),
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

/// Spawn the service and return a handle
fn spawn_service(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_cdr-ingestor"))
        .env("CDR_INGESTOR_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn service")
}

/// Minimal HTTP/1.1 GET returning the raw response
async fn http_get(port: u16, path: &str) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.ok()?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await.ok()?;
    Some(response)
}

/// Wait for the status server to answer
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if http_get(port, "/api/v1/health").await.is_some() {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_service_starts_and_serves_status() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&config_in(dir.path(), port));

    let mut child = spawn_service(config.path());
    assert!(
        wait_for_server(port, 100).await,
        "Service did not start within timeout"
    );

    let health = http_get(port, "/api/v1/health").await.unwrap();
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains(r#""status":"ok""#));

    let status = http_get(port, "/api/v1/status").await.unwrap();
    assert!(status.contains(r#""initialized":true"#));

    // Initialization created the layout and the database
    assert!(dir.path().join("cdr").is_dir());
    assert!(dir.path().join("cdr.db").exists());

    child.kill().await.unwrap();
}

#[tokio::test]
async fn test_service_exits_on_invalid_config() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let mut content = config_in(dir.path(), port);
    content.push_str("\n[pipeline]\nbatch_size = 0\n");
    let config = write_config(&content);

    let mut child = spawn_service(config.path());
    let status = timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("Service did not exit")
        .unwrap();
    assert!(!status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn test_service_stops_on_sigterm() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&config_in(dir.path(), port));

    let mut child = spawn_service(config.path());
    assert!(wait_for_server(port, 100).await);

    let pid = child.id().unwrap();
    let killed = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("Service did not stop after SIGTERM")
        .unwrap();
    assert!(status.success());
}
