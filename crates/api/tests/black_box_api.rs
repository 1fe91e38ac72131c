use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use roster_api::app::services::AppServices;
use roster_api::notify::{Notifier, NoopNotifier};
use roster_core::{Lang, ListLimit, ListPolicy, ParticipantRecord, Participation, UserId};
use roster_infra::{CsvFileLedger, InMemoryLedger, LedgerError, LedgerResult, ParticipantLedger};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = roster_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn in_memory() -> Self {
        Self::spawn(AppServices::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(NoopNotifier),
            ListPolicy::default(),
        ))
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, Lang)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn participation_confirmed(&self, user_id: UserId, lang: Lang) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((user_id, lang));
        Ok(())
    }
}

struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn participation_confirmed(&self, _user_id: UserId, _lang: Lang) -> anyhow::Result<()> {
        anyhow::bail!("bot was blocked by the user")
    }
}

/// Ledger whose storage is gone: every call fails with an I/O error.
struct UnreachableLedger;

fn disk_gone<T>() -> LedgerResult<T> {
    Err(LedgerError::Io {
        op: "read",
        path: "/var/lib/roster/participants.csv".into(),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
    })
}

#[async_trait]
impl ParticipantLedger for UnreachableLedger {
    async fn upsert(&self, _event: Participation) -> LedgerResult<()> {
        disk_gone()
    }

    async fn get_lang(&self, _user_id: UserId) -> LedgerResult<Lang> {
        disk_gone()
    }

    async fn set_lang(&self, _user_id: UserId, _lang: &str) -> LedgerResult<()> {
        disk_gone()
    }

    async fn count(&self) -> LedgerResult<usize> {
        disk_gone()
    }

    async fn count_by_lang(&self) -> LedgerResult<BTreeMap<Lang, usize>> {
        disk_gone()
    }

    async fn list_recent(&self, _limit: ListLimit) -> LedgerResult<Vec<ParticipantRecord>> {
        disk_gone()
    }

    async fn snapshot(&self) -> LedgerResult<Vec<ParticipantRecord>> {
        disk_gone()
    }

    async fn reset(&self) -> LedgerResult<()> {
        disk_gone()
    }
}

async fn participate(client: &reqwest::Client, base_url: &str, body: serde_json::Value) -> reqwest::Response {
    client
        .post(format!("{}/participants", base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::in_memory().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn participation_is_recorded_and_confirmed() {
    let notifier = Arc::new(RecordingNotifier::default());
    let srv = TestServer::spawn(AppServices::new(
        Arc::new(InMemoryLedger::new()),
        notifier.clone(),
        ListPolicy::default(),
    ))
    .await;
    let client = reqwest::Client::new();

    let res = participate(
        &client,
        &srv.base_url,
        json!({"user_id": 42, "username": "alice", "full_name": "Alice A", "source": "/start"}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({"user_id": 42, "lang": "ru"}));

    let res = participate(
        &client,
        &srv.base_url,
        json!({"user_id": 42, "source": "button", "lang": "uz"}),
    )
    .await;
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["lang"], "uz");

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(UserId::new(42), Lang::Ru), (UserId::new(42), Lang::Uz)]);

    let res = client
        .get(format!("{}/participants/recent", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["source"], "button");
    assert_eq!(items[0]["username"], "", "names are overwritten by the latest event");
}

#[tokio::test]
async fn notifier_failure_does_not_fail_the_request() {
    let srv = TestServer::spawn(AppServices::new(
        Arc::new(InMemoryLedger::new()),
        Arc::new(BrokenNotifier),
        ListPolicy::default(),
    ))
    .await;
    let client = reqwest::Client::new();

    let res = participate(&client, &srv.base_url, json!({"user_id": 5, "source": "/start"})).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn blank_source_is_a_validation_error() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();

    let res = participate(&client, &srv.base_url, json!({"user_id": 5, "source": "  "})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn language_preference_round_trip() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/participants/777/lang", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["lang"], "ru");

    let res = client
        .put(format!("{}/participants/777/lang", srv.base_url))
        .json(&json!({"lang": "UZ"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["lang"], "uz");

    // Unsupported codes are stored as the default.
    let res = client
        .put(format!("{}/participants/777/lang", srv.base_url))
        .json(&json!({"lang": "en"}))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["lang"], "ru");

    let res = client
        .get(format!("{}/participants/not-a-number/lang", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recent_listing_clamps_the_limit() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();

    for id in 1..=3 {
        participate(&client, &srv.base_url, json!({"user_id": id, "source": "/start"})).await;
    }

    let fetch = |query: &'static str| {
        let client = client.clone();
        let url = format!("{}/participants/recent{}", srv.base_url, query);
        async move {
            let body: serde_json::Value = client.get(url).send().await.unwrap().json().await.unwrap();
            body
        }
    };

    let body = fetch("?limit=0").await;
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let body = fetch("?limit=500").await;
    assert_eq!(body["limit"], 200);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);

    let body = fetch("?limit=abc").await;
    assert_eq!(body["limit"], 20);

    let body = fetch("").await;
    assert_eq!(body["limit"], 20);
    let ids: Vec<i64> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["user_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn stats_count_and_summary() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .get(format!("{}/stats", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"count": 0, "by_lang": {"ru": 0, "uz": 0}, "summary": ""}));

    participate(&client, &srv.base_url, json!({"user_id": 1, "source": "/start"})).await;
    participate(&client, &srv.base_url, json!({"user_id": 2, "source": "/start"})).await;
    participate(&client, &srv.base_url, json!({"user_id": 3, "source": "button", "lang": "uz"})).await;

    let body: serde_json::Value = client
        .get(format!("{}/stats", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(body["by_lang"], json!({"ru": 2, "uz": 1}));
    assert_eq!(body["summary"], "ru: 2, uz: 1");
}

#[tokio::test]
async fn export_serves_the_csv_artifact_and_reset_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("participants.csv");
    let ledger = Arc::new(CsvFileLedger::open(&path).await.unwrap());
    let srv = TestServer::spawn(AppServices::new(
        ledger.clone(),
        Arc::new(NoopNotifier),
        ListPolicy::default(),
    ))
    .await;
    let client = reqwest::Client::new();

    participate(&client, &srv.base_url, json!({"user_id": 10, "username": "bob", "source": "/start"})).await;

    let res = client
        .get(format!("{}/export", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("participants.csv"));
    let body = res.bytes().await.unwrap();
    assert_eq!(body.as_ref(), std::fs::read(&path).unwrap().as_slice());

    let res = client
        .get(format!("{}/export?format=tsv", srv.base_url))
        .send()
        .await
        .unwrap();
    let text = res.text().await.unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("10\tbob\t"));

    let res = client
        .delete(format!("{}/participants", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(ledger.count().await.unwrap(), 0);
}

#[tokio::test]
async fn storage_failures_surface_as_server_errors() {
    let notifier = Arc::new(RecordingNotifier::default());
    let srv = TestServer::spawn(AppServices::new(
        Arc::new(UnreachableLedger),
        notifier.clone(),
        ListPolicy::default(),
    ))
    .await;
    let client = reqwest::Client::new();

    let res = participate(&client, &srv.base_url, json!({"user_id": 1, "source": "/start"})).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "storage_error");
    assert!(body["message"].as_str().unwrap().contains("permission denied"));
    assert!(notifier.sent.lock().unwrap().is_empty(), "no confirmation for a failed write");

    for path in ["/stats", "/export", "/participants/1/lang", "/participants/recent"] {
        let res = client
            .get(format!("{}{}", srv.base_url, path))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "{path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "storage_error", "{path}");
    }
}
