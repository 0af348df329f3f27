//! Integration tests for relaycache

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a config whose stores live under `dir` and whose origin is `origin`
fn write_config(dir: &Path, origin: &str, extra: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let content = format!(
        r#"[origin]
url = "{origin}/"

[stores]
dir = "{stores}"

[seeds]
main = ["/"]
fonts = []

[prewarm]
enabled = false

{extra}
"#,
        origin = origin.trim_end_matches('/'),
        stores = dir.join("stores").display(),
        extra = extra,
    );
    std::fs::write(&path, content).unwrap();
    path
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relaycache(config: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("relaycache");
        cmd.env_remove("RELAYCACHE_CONFIG").arg("--config").arg(config);
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("relaycache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Request-interception caching layer"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("relaycache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("relaycache"));
    }

    #[test]
    fn config_path_honours_flag() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("custom.toml");
        relaycache(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("nested").join("config.toml");

        relaycache(&config)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(config.exists());

        relaycache(&config)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));

        relaycache(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[stores]"))
            .stdout(predicate::str::contains("team_image_ms = 3000"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "[origin]\nurl = \"not a url\"\n").unwrap();

        relaycache(&config)
            .args(["stores", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("config init --force"));
    }

    #[test]
    fn invalid_message_reports_hint() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://localhost:3000", "");

        relaycache(&config)
            .args(["message", r#"{"type":"REBOOT"}"#])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid control message"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn stores_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://localhost:3000", "");

        relaycache(&config)
            .args(["stores", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No stores found"));
    }

    #[test]
    fn clearing_missing_store_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "http://localhost:3000", "");

        relaycache(&config)
            .args(["stores", "clear", "relay-main-v0", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Store not found"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn install_then_serve_offline_navigation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>shell</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html>about</html>")
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.uri(), "[timeouts]\nfetch_ms = 300\n");

        relaycache(&config)
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("is active"));

        relaycache(&config)
            .args(["stores", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("relay-main-v1"))
            .stdout(predicate::str::contains("relay-team-images-v1"));

        relaycache(&config)
            .args(["stores", "show", "relay-main-v1", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("{}/", server.uri())));

        // The slow origin trips the fetch ceiling; the cached shell answers
        relaycache(&config)
            .args(["fetch", "--navigate", "--include"])
            .arg(format!("{}/about", server.uri()))
            .assert()
            .success()
            .stdout(predicate::str::contains("cache:relay-main-v1"))
            .stdout(predicate::str::contains("<html>shell</html>"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activate_removes_stale_stores() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("shell"))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let old = write_config(temp.path(), &server.uri(), "");
        relaycache(&old).arg("install").assert().success();

        let new = write_config(temp.path(), &server.uri(), "");
        let content = std::fs::read_to_string(&new).unwrap();
        std::fs::write(&new, content.replace("[stores]\n", "[stores]\nversion = \"v2\"\n")).unwrap();

        relaycache(&new)
            .arg("activate")
            .assert()
            .success()
            .stdout(predicate::str::contains("relay-main-v1"));

        relaycache(&new)
            .args(["stores", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("-v1").not());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_font_message_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fonts/inter.woff2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"wOF2".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), &server.uri(), "");
        let font = format!("{}/fonts/inter.woff2", server.uri());

        relaycache(&config)
            .arg("message")
            .arg(format!(r#"{{"type":"CACHE_FONT","url":"{}"}}"#, font))
            .assert()
            .success()
            .stdout(predicate::str::contains("relay-fonts-v1"));

        // Cache-first: answered from disk, the origin sees one request
        relaycache(&config)
            .args(["fetch", &font])
            .assert()
            .success()
            .stdout(predicate::str::contains("wOF2"));
    }
}

mod network_tests {
    use relaycache::config::{BackendKind, Config};
    use relaycache::fetch::{Fetcher, HttpFetcher, RequestDescriptor, ResponseSource};
    use relaycache::store::{CacheKey, CacheRegistry, MemoryStorage};
    use relaycache::{RelayError, Worker};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    fn config(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.origin.url = format!("{}/", server.uri());
        config.stores.backend = BackendKind::Memory;
        config.seeds.main = vec!["/".to_string()];
        config.seeds.fonts.clear();
        config.prewarm.enabled = false;
        config.timeouts.team_image_ms = 200;
        config.timeouts.fetch_ms = 5_000;
        config
    }

    fn worker(server: &MockServer) -> Worker {
        let registry = CacheRegistry::new(Arc::new(MemoryStorage::new()), vec![]);
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)));
        Worker::new(config(server), registry, fetcher)
    }

    #[tokio::test]
    async fn http_fetcher_passes_status_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_raw(r#"{"ok":true}"#.as_bytes().to_vec(), "application/json"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5));
        let request = RequestDescriptor::get(url(&server, "/data.json"))
            .with_header("Accept", "application/json");
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.text(), r#"{"ok":true}"#);
        assert_eq!(response.source, ResponseSource::Network);
    }

    #[tokio::test]
    async fn http_fetcher_returns_error_statuses() {
        let server = MockServer::start().await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5));
        let response = fetcher
            .fetch(&RequestDescriptor::get(url(&server, "/missing")))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn http_fetcher_reports_unreachable_host() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        let request = RequestDescriptor::get(Url::parse("http://127.0.0.1:9/").unwrap());
        let err = fetcher.fetch(&request).await.unwrap_err();
        assert!(matches!(err, RelayError::Network { .. }));
    }

    #[tokio::test]
    async fn static_asset_is_cached_after_first_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/js/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .expect(1)
            .mount(&server)
            .await;

        let worker = worker(&server);
        let request = RequestDescriptor::get(url(&server, "/js/app.js"));

        let first = worker.fetch(&request).await.into_response().unwrap();
        assert_eq!(first.source, ResponseSource::Network);

        let second = worker.fetch(&request).await.into_response().unwrap();
        assert!(second.is_from_cache());
        assert_eq!(second.text(), "console.log(1)");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_team_image_falls_back_to_jpeg() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/images/team/ana.webp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"WEBP".to_vec())
                    .set_delay(Duration::from_millis(1_000)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/images/team/ana.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"JPEG".to_vec()))
            .mount(&server)
            .await;

        let worker = worker(&server);
        let webp = url(&server, "/images/team/ana.webp");

        let started = Instant::now();
        let response = worker
            .fetch(&RequestDescriptor::get(webp.clone()))
            .await
            .into_response()
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(response.text(), "JPEG");

        // The abandoned webp fetch still lands in the store
        worker.wait_until_idle().await;
        let stored = worker
            .registry()
            .get("relay-team-images-v1", &CacheKey::get(&webp))
            .await
            .unwrap();
        assert_eq!(stored.body, b"WEBP");
    }

    #[tokio::test]
    async fn payment_api_is_never_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/payments/intent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let worker = worker(&server);
        worker.start().await.unwrap();
        let response = worker
            .fetch(&RequestDescriptor::get(url(&server, "/api/payments/intent")))
            .await
            .into_response()
            .unwrap();
        assert_eq!(response.status, 200);

        for name in worker.registry().list_names().await.unwrap() {
            let keys = worker.registry().keys(&name).await.unwrap();
            assert!(keys.iter().all(|k| !k.url.contains("/api/payments")));
        }
    }
}
