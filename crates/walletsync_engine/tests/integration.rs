//! Integration tests driving the sync engine through the REST backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use walletsync_engine::{
    Clock, CollectionRegistry, EntitySync, HttpClient, HttpRequest, HttpResponse, ManualClock,
    MemoryBackend, MemoryStore, Method, RefResolver, RemoteBackend, RemoteError, RestBackend,
    SyncContext, SyncEngine, SyncError, SyncResult,
};
use walletsync_protocol::{LocalRecord, Query, RemoteId, RemoteRow};

const BASE_URL: &str = "https://db.example.com";
const API_KEY: &str = "anon-key";

/// An HTTP client answering PostgREST requests from an in-memory backend.
struct FakePostgrest {
    backend: Arc<MemoryBackend>,
}

impl FakePostgrest {
    fn parse(url: &str) -> Option<(String, Query, Option<RemoteId>)> {
        let rest = url.strip_prefix(BASE_URL)?.strip_prefix("/rest/v1/")?;
        let (table, params) = rest.split_once('?').unwrap_or((rest, ""));
        let table = urlencoding::decode(table).ok()?.into_owned();

        let mut query = Query::new();
        let mut id = None;
        for param in params.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = param.split_once('=')?;
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            match key.as_str() {
                "select" => {}
                "order" => {
                    let (column, direction) = value.rsplit_once('.')?;
                    query = query.order_by(column, direction == "asc");
                }
                column => {
                    let (op, operand) = value.split_once('.')?;
                    query = match op {
                        "eq" => {
                            if column == "id" {
                                id = Some(RemoteId::new(operand));
                            }
                            query.eq(column, operand)
                        }
                        "gt" => query.gt(column, operand),
                        _ => return None,
                    };
                }
            }
        }
        Some((table, query, id))
    }

    fn json(status: u16, rows: &[RemoteRow]) -> HttpResponse {
        HttpResponse::new(status, serde_json::to_vec(rows).unwrap())
    }

    fn error(error: RemoteError) -> HttpResponse {
        let status = match error {
            RemoteError::NotFound { .. } => 404,
            RemoteError::Rejected(_) => 409,
            _ => 500,
        };
        HttpResponse::new(status, error.to_string())
    }
}

#[async_trait]
impl HttpClient for FakePostgrest {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        if request.header("apikey") != Some(API_KEY) {
            return Ok(HttpResponse::new(401, "missing apikey"));
        }
        let Some((table, query, id)) = Self::parse(&request.url) else {
            return Ok(HttpResponse::new(400, "malformed url"));
        };
        let body = request
            .body
            .as_deref()
            .map(|b| serde_json::from_slice::<RemoteRow>(b).map_err(|e| e.to_string()))
            .transpose()?;

        let response = match (request.method, id, body) {
            (Method::Get, _, _) => match self.backend.select(&table, &query).await {
                Ok(rows) => Self::json(200, &rows),
                Err(e) => Self::error(e),
            },
            (Method::Post, _, Some(body)) => match self.backend.insert(&table, body).await {
                Ok(row) => Self::json(201, &[row]),
                Err(e) => Self::error(e),
            },
            (Method::Patch, Some(id), Some(body)) => match self.backend.update(&table, &id, body).await {
                Ok(row) => Self::json(200, &[row]),
                Err(RemoteError::NotFound { .. }) => Self::json(200, &[]),
                Err(e) => Self::error(e),
            },
            (Method::Delete, Some(id), _) => match self.backend.delete(&table, &id).await {
                Ok(()) => HttpResponse::new(204, Vec::new()),
                Err(e) => Self::error(e),
            },
            _ => HttpResponse::new(400, "unsupported request"),
        };
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    title: String,
    done: bool,
}

struct Tasks;

#[async_trait]
impl EntitySync for Tasks {
    type Entity = Task;

    fn local_table(&self) -> &'static str {
        "tasks"
    }

    fn remote_table(&self) -> &'static str {
        "tasks"
    }

    async fn map_in(&self, row: &RemoteRow, _refs: &RefResolver) -> SyncResult<Task> {
        Ok(Task {
            title: row.str("title")?.to_string(),
            done: row.flag("done")?,
        })
    }

    async fn map_out(&self, record: &LocalRecord<Task>, _refs: &RefResolver) -> SyncResult<RemoteRow> {
        Ok(RemoteRow::new()
            .with("title", record.data.title.as_str())
            .with("done", record.data.done))
    }
}

struct Device {
    clock: Arc<ManualClock>,
    server: Arc<MemoryBackend>,
    engine: SyncEngine<Tasks>,
}

fn device(api_key: &str) -> Device {
    let clock = Arc::new(ManualClock::starting_2024());
    let server = Arc::new(MemoryBackend::new(clock.clone()).with_session_user("user-1"));
    let rest = RestBackend::new(
        format!("{BASE_URL}/"),
        FakePostgrest {
            backend: server.clone(),
        },
    )
    .with_api_key(api_key)
    .with_access_token("jwt");

    let registry = CollectionRegistry::new().with("tasks", "tasks").unwrap();
    let ctx = SyncContext::new(Arc::new(MemoryStore::new()), Arc::new(rest), registry)
        .with_clock(clock.clone());
    Device {
        clock,
        server,
        engine: SyncEngine::new(Tasks, ctx).unwrap(),
    }
}

#[tokio::test]
async fn local_task_round_trips_through_rest() {
    let device = device(API_KEY);
    let created = device
        .engine
        .collection()
        .create(
            Task {
                title: "Pay rent".into(),
                done: false,
            },
            device.clock.now(),
        )
        .await
        .unwrap();

    let counts = device.engine.sync("user-1").await.unwrap();
    assert_eq!(counts.changes_pushed, 1);

    let stored = device.engine.collection().get(&created.id).await.unwrap().unwrap();
    let remote_id = stored.remote_id.clone().unwrap();
    assert!(!stored.dirty);
    let row = device.server.row("tasks", &remote_id).unwrap();
    assert_eq!(row.str("title").unwrap(), "Pay rent");
    assert_eq!(row.str("user_id").unwrap(), "user-1");

    device
        .engine
        .collection()
        .edit(&created.id, device.clock.now(), |t| t.done = true)
        .await
        .unwrap();
    device.engine.sync("user-1").await.unwrap();
    assert!(device.server.row("tasks", &remote_id).unwrap().flag("done").unwrap());
}

#[tokio::test]
async fn remote_changes_and_deletions_arrive_through_rest() {
    let device = device(API_KEY);
    let remote_id = device
        .server
        .insert("tasks", RemoteRow::new().with("title", "Call bank"))
        .await
        .unwrap()
        .id()
        .unwrap();

    let counts = device.engine.sync("user-1").await.unwrap();
    assert_eq!(counts.changes_pulled, 1);
    let local = device
        .engine
        .collection()
        .find_by_remote_id(&remote_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local.data.title, "Call bank");

    device.server.delete("tasks", &remote_id).await.unwrap();
    let counts = device.engine.sync("user-1").await.unwrap();
    assert_eq!(counts.deletions_pulled, 1);
    assert!(device.engine.collection().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn local_deletion_is_pushed_through_rest() {
    let device = device(API_KEY);
    let remote_id = device
        .server
        .insert("tasks", RemoteRow::new().with("title", "Old"))
        .await
        .unwrap()
        .id()
        .unwrap();
    device.engine.sync("user-1").await.unwrap();
    let local = device
        .engine
        .collection()
        .find_by_remote_id(&remote_id)
        .await
        .unwrap()
        .unwrap();

    device.engine.ledger().destroy("tasks", &local.id).await.unwrap();
    let counts = device.engine.sync("user-1").await.unwrap();
    assert_eq!(counts.deletions_pushed, 1);
    assert!(device.server.row("tasks", &remote_id).is_none());
    assert_eq!(device.server.trash_for("tasks").len(), 1);
    assert!(device.engine.ledger().pending("tasks").await.unwrap().is_empty());
}

#[tokio::test]
async fn unauthorized_requests_fail_the_sync() {
    let device = device("wrong-key");
    let err = device.engine.sync("user-1").await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Remote(RemoteError::Status { status: 401, .. })
    ));
    assert!(device.engine.last_sync().await.unwrap() < device.clock.now());
    assert!(device.engine.stats().last_error.is_some());
}
