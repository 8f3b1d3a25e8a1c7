//! Integration tests for Stowaway

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use stowaway::request::{RequestKey, Response};
    use stowaway::store::{CacheStore, DiskStore};
    use tempfile::TempDir;
    use url::Url;

    fn stowaway() -> Command {
        let mut cmd = cargo_bin_cmd!("stowaway");
        cmd.env_remove("STOWAWAY_CONFIG");
        cmd
    }

    /// Write a config that keeps the store inside `dir`
    fn write_config(dir: &Path, origin: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let content = format!(
            "[worker]\norigin = \"{}\"\nversion = \"v1\"\n\n[store]\nbackend = \"disk\"\npath = '{}'\n",
            origin,
            dir.join("store").display()
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    fn with_config(config: &Path) -> Command {
        let mut cmd = stowaway();
        cmd.arg("--no-local").arg("--config").arg(config);
        cmd
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    /// Seed a namespace with a single entry
    fn seed(store_root: &Path, namespace: &str, url: &str, body: &'static str) {
        let store = DiskStore::new(store_root);
        runtime().block_on(async {
            let handle = store.open(namespace).await.unwrap();
            let key = RequestKey::get(&Url::parse(url).unwrap());
            let response = Response::new(200)
                .with_header("Content-Type", "text/html")
                .with_body(body);
            handle.put(&key, &response).await.unwrap();
        });
    }

    /// A local port with nothing listening on it
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn help_displays() {
        stowaway()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline-first caching proxy"));
    }

    #[test]
    fn version_displays() {
        stowaway()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("stowaway"));
    }

    #[test]
    fn unknown_command_fails() {
        stowaway().arg("frobnicate").assert().failure();
    }

    #[test]
    fn config_path_honors_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");

        with_config(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        with_config(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(path.is_file());

        with_config(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        with_config(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]"))
            .stdout(predicate::str::contains("offline_page"));
    }

    #[test]
    fn missing_explicit_config_fails_with_hint() {
        let dir = TempDir::new().unwrap();

        with_config(&dir.path().join("absent.toml"))
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("stowaway config init"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[worker]\nversion = \"../escape\"\n").unwrap();

        with_config(&path)
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn cache_list_empty_store() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "http://app.test/");

        with_config(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache namespaces found"));
    }

    #[test]
    fn cache_list_and_show_seeded_store() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "http://app.test/");
        let root = dir.path().join("store");
        seed(&root, "v0", "http://app.test/", "old home");
        seed(&root, "v1", "http://app.test/offline.html", "offline");

        with_config(&config)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("v0\nv1\n");

        with_config(&config)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"current\": true"));

        with_config(&config)
            .args(["cache", "show", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://app.test/offline.html"));
    }

    #[test]
    fn activate_requires_installed_version() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "http://app.test/");
        seed(&dir.path().join("store"), "v0", "http://app.test/", "old home");

        with_config(&config)
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not installed"));
    }

    #[test]
    fn activate_deletes_stale_namespaces() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "http://app.test/");
        let root = dir.path().join("store");
        seed(&root, "v0", "http://app.test/", "old home");
        seed(&root, "v1", "http://app.test/", "home");

        with_config(&config)
            .arg("activate")
            .assert()
            .success()
            .stdout(predicate::str::contains("v0"));

        let namespaces = runtime()
            .block_on(DiskStore::new(&root).namespaces())
            .unwrap();
        assert_eq!(namespaces, vec!["v1".to_string()]);
    }

    #[test]
    fn install_against_unreachable_origin_fails() {
        let dir = TempDir::new().unwrap();
        let origin = format!("http://127.0.0.1:{}/", closed_port());
        let config = write_config(dir.path(), &origin);

        with_config(&config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Install of v1 failed"));
    }

    #[test]
    fn fetch_navigation_offline_serves_offline_page() {
        let dir = TempDir::new().unwrap();
        let origin = format!("http://127.0.0.1:{}/", closed_port());
        let config = write_config(dir.path(), &origin);
        seed(
            &dir.path().join("store"),
            "v1",
            &format!("{}offline.html", origin),
            "you are offline",
        );

        with_config(&config)
            .args(["fetch", "/pricing", "--html", "--body"])
            .assert()
            .success()
            .stdout(predicate::str::contains("source: offline"))
            .stdout(predicate::str::contains("you are offline"));
    }

    #[test]
    fn fetch_asset_offline_miss_fails() {
        let dir = TempDir::new().unwrap();
        let origin = format!("http://127.0.0.1:{}/", closed_port());
        let config = write_config(dir.path(), &origin);
        seed(
            &dir.path().join("store"),
            "v1",
            &format!("{}offline.html", origin),
            "you are offline",
        );

        with_config(&config)
            .args(["fetch", "/logo.svg"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Network request"));
    }
}

mod offline_scenario {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use stowaway::config::{Config, StoreBackend};
    use stowaway::error::{StowawayError, StowawayResult};
    use stowaway::lifecycle::LifecycleState;
    use stowaway::network::Fetcher;
    use stowaway::request::{Request, RequestKey, Response};
    use stowaway::store::{CacheStore, DiskStore};
    use stowaway::strategy::{FetchOutcome, Source};
    use stowaway::worker::{Startup, Worker};
    use tempfile::TempDir;
    use url::Url;

    const ORIGIN: &str = "http://app.test/";

    /// Network double serving a fixed site
    #[derive(Default)]
    struct Site {
        offline: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl Site {
        fn calls_to(&self, path: &str) -> usize {
            let target = url(path).to_string();
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| **c == target)
                .count()
        }
    }

    #[async_trait]
    impl Fetcher for Site {
        async fn fetch(&self, request: &Request) -> StowawayResult<Response> {
            self.calls.lock().unwrap().push(request.url.to_string());
            if self.offline.load(Ordering::SeqCst) {
                return Err(StowawayError::network(request.url.as_str(), "offline"));
            }
            let body = match request.url.path() {
                "/" => "<h1>home</h1>",
                "/offline.html" => "<h1>offline</h1>",
                "/logo.svg" => "<svg/>",
                _ => return Ok(Response::new(404)),
            };
            Ok(Response::new(200).with_body(body))
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.worker.origin = ORIGIN.to_string();
        config.worker.version = "v1".to_string();
        config.store.backend = StoreBackend::Disk;
        config.store.path = Some(dir.path().to_path_buf());
        config
    }

    fn served(outcome: FetchOutcome) -> (Response, Source) {
        match outcome {
            FetchOutcome::Served(served) => (served.response, served.source),
            other => panic!("expected a served response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn install_activate_and_serve_offline() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DiskStore::new(dir.path()));

        let stale = store.open("v0").await.unwrap();
        stale
            .put(&RequestKey::get(&url("/")), &Response::new(200).with_body("v0 home"))
            .await
            .unwrap();

        let site = Arc::new(Site::default());
        let worker = Worker::new(&config(&dir), store.clone(), site.clone()).unwrap();

        let report = worker.start().await.unwrap().unwrap();
        assert_eq!(report.deleted, vec!["v0".to_string()]);
        assert_eq!(worker.state(), LifecycleState::Active);
        assert_eq!(store.namespaces().await.unwrap(), vec!["v1".to_string()]);

        let current = store.open("v1").await.unwrap();
        assert!(current.get(&RequestKey::get(&url("/"))).await.unwrap().is_some());
        assert!(current
            .get(&RequestKey::get(&url("/offline.html")))
            .await
            .unwrap()
            .is_some());

        // Asset: fetched once, then served from cache
        let (first, source) = served(worker.fetch(Request::get(url("/logo.svg"))).await.unwrap());
        assert_eq!(source, Source::Network);
        let (second, source) = served(worker.fetch(Request::get(url("/logo.svg"))).await.unwrap());
        assert_eq!(source, Source::Cache);
        assert_eq!(first.body, second.body);
        assert_eq!(site.calls_to("/logo.svg"), 1);

        // Navigation while offline falls back to the offline page
        site.offline.store(true, Ordering::SeqCst);
        let (page, source) = served(
            worker
                .fetch(Request::get(url("/")).with_header("Accept", "text/html"))
                .await
                .unwrap(),
        );
        assert_eq!(source, Source::Offline);
        assert_eq!(page.body, "<h1>offline</h1>");

        // Cached assets keep working offline
        let (_, source) = served(worker.fetch(Request::get(url("/logo.svg"))).await.unwrap());
        assert_eq!(source, Source::Cache);

        // Writes are never intercepted
        let post = Request::new("POST", url("/api/items")).with_body("{}");
        assert!(matches!(
            worker.fetch(post).await.unwrap(),
            FetchOutcome::PassThrough(_)
        ));
    }

    #[tokio::test]
    async fn failed_install_leaves_previous_version_serving() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DiskStore::new(dir.path()));
        let site = Arc::new(Site::default());

        let v1 = Worker::new(&config(&dir), store.clone(), site.clone()).unwrap();
        v1.start().await.unwrap();

        site.offline.store(true, Ordering::SeqCst);
        let mut next = config(&dir);
        next.worker.version = "v2".to_string();
        let v2 = Worker::new(&next, store.clone(), site.clone()).unwrap();

        assert!(v2.start().await.is_err());
        assert_eq!(v2.state(), LifecycleState::Redundant);
        assert_eq!(store.namespaces().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn restart_while_offline_keeps_serving_installed_version() {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(Site::default());

        let first = Worker::new(&config(&dir), Arc::new(DiskStore::new(dir.path())), site.clone())
            .unwrap();
        first.start().await.unwrap();
        drop(first);

        // A new process over the same directory, upstream down
        site.offline.store(true, Ordering::SeqCst);
        let store = Arc::new(DiskStore::new(dir.path()));
        let (worker, startup) = Worker::launch(&config(&dir), store.clone(), site.clone())
            .await
            .unwrap();
        assert!(matches!(startup, Startup::Resumed(_)));
        assert_eq!(worker.state(), LifecycleState::Active);

        let (page, source) = served(
            worker
                .fetch(Request::get(url("/docs")).with_header("Accept", "text/html"))
                .await
                .unwrap(),
        );
        assert_eq!(source, Source::Offline);
        assert_eq!(page.body, "<h1>offline</h1>");
    }
}
