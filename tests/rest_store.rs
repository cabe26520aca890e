use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use compdir::backend::{
    Backend, BackendCommand, BackendEvent, MutationOp, load_failure, mutation_failure,
};
use compdir::client::{CompanyStore, RestStore, StoreError};
use compdir::company::Company;
use compdir::mutation::Directory;

#[derive(Default)]
struct FakeServer {
    rows: Vec<Company>,
    next_id: u64,
    failures: usize,
    list_delay: Option<Duration>,
    ack_updates: bool,
}

impl FakeServer {
    fn take_failure(&mut self) -> bool {
        if self.failures > 0 {
            self.failures -= 1;
            true
        } else {
            false
        }
    }
}

type Shared = Arc<Mutex<FakeServer>>;

async fn list(State(server): State<Shared>) -> Result<Json<Vec<Company>>, StatusCode> {
    let (delay, fail, rows) = {
        let mut server = server.lock().unwrap();
        let fail = server.take_failure();
        (server.list_delay, fail, server.rows.clone())
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if fail {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(rows))
}

async fn create(
    State(server): State<Shared>,
    Json(mut company): Json<Company>,
) -> Result<(StatusCode, Json<Company>), StatusCode> {
    let mut server = server.lock().unwrap();
    if server.take_failure() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    server.next_id += 1;
    company.id = Some(server.next_id);
    server.rows.push(company.clone());
    Ok((StatusCode::CREATED, Json(company)))
}

async fn update(
    State(server): State<Shared>,
    Path(id): Path<u64>,
    Json(company): Json<Company>,
) -> Result<Json<Value>, StatusCode> {
    let mut server = server.lock().unwrap();
    if server.take_failure() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let slot = server
        .rows
        .iter_mut()
        .find(|c| c.id == Some(id))
        .ok_or(StatusCode::NOT_FOUND)?;
    *slot = company;
    slot.id = Some(id);
    let stored = slot.clone();
    if server.ack_updates {
        return Ok(Json(json!({ "success": true })));
    }
    serde_json::to_value(stored)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn delete(State(server): State<Shared>, Path(id): Path<u64>) -> StatusCode {
    let mut server = server.lock().unwrap();
    if server.take_failure() {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let before = server.rows.len();
    server.rows.retain(|c| c.id != Some(id));
    if server.rows.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

async fn serve(server: FakeServer) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(server));
    let app = Router::new()
        .route("/companies", get(list).post(create))
        .route("/companies/:id", axum::routing::put(update).delete(delete))
        .with_state(shared.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), shared)
}

fn company(name: &str) -> Company {
    Company {
        id: None,
        name: name.into(),
        location: "Oslo".into(),
        industry: "Energy".into(),
        employees: "51-100".into(),
        revenue: "$10M - $50M".into(),
        website: format!("{}.example", name.to_lowercase()),
        founded: "1987".into(),
        status: "Active".into(),
    }
}

fn seeded(names: &[&str]) -> FakeServer {
    let rows: Vec<Company> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| Company {
            id: Some(idx as u64 + 1),
            ..company(name)
        })
        .collect();
    FakeServer {
        next_id: rows.len() as u64,
        rows,
        ..FakeServer::default()
    }
}

#[tokio::test]
async fn crud_round_trip() {
    let (url, shared) = serve(seeded(&["Acme", "Globex"])).await;
    let store = RestStore::new(url, Duration::from_secs(5));

    let rows = store.list().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].name, "Globex");

    let created = store.create(&company("Initech")).await.unwrap();
    assert_eq!(created.id, Some(3));

    let mut changed = created.clone();
    changed.status = "Inactive".into();
    let updated = store.update(3, &changed).await.unwrap();
    assert_eq!(updated.id, Some(3));
    assert_eq!(updated.status, "Inactive");

    store.delete(1).await.unwrap();
    let names: Vec<String> = shared
        .lock()
        .unwrap()
        .rows
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(names, vec!["Globex", "Initech"]);
}

#[tokio::test]
async fn failed_delete_keeps_directory_then_retry_removes_one() {
    let (url, shared) = serve(seeded(&["Acme", "Globex", "Hooli"])).await;
    let store = RestStore::new(url, Duration::from_secs(5));
    let mut directory = Directory::new(store.list().await.unwrap());

    shared.lock().unwrap().failures = 1;
    let err = store.delete(2).await.unwrap_err();
    assert_eq!(
        mutation_failure(MutationOp::Delete, &err),
        "Failed to delete company: 500 Internal Server Error"
    );
    assert_eq!(directory.len(), 3);

    store.delete(2).await.unwrap();
    assert_eq!(directory.apply_deleted(2), 1);
    assert_eq!(directory.len(), 2);
    assert!(directory.find(2).is_none());
}

#[tokio::test]
async fn update_keeps_sent_record_when_store_only_acknowledges() {
    let server = FakeServer {
        ack_updates: true,
        ..seeded(&["Acme", "Globex"])
    };
    let (url, _shared) = serve(server).await;
    let store = RestStore::new(url, Duration::from_secs(5));
    let mut directory = Directory::new(store.list().await.unwrap());

    let mut renamed = company("Globex Ltd");
    renamed.id = Some(2);
    let updated = store.update(2, &renamed).await.unwrap();
    assert_eq!(updated.id, Some(2));
    assert_eq!(updated.name, "Globex Ltd");
    assert_eq!(updated.location, "Oslo");

    assert!(directory.apply_updated(updated));
    assert_eq!(directory.find(2).map(|c| c.name.as_str()), Some("Globex Ltd"));
}

#[tokio::test]
async fn update_of_unknown_record_is_a_status_error() {
    let (url, _shared) = serve(seeded(&["Acme"])).await;
    let store = RestStore::new(url, Duration::from_secs(5));
    let err = store.update(42, &company("Ghost")).await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 404, .. }));
}

#[tokio::test]
async fn slow_list_times_out() {
    let server = FakeServer {
        list_delay: Some(Duration::from_millis(500)),
        ..seeded(&["Acme"])
    };
    let (url, _shared) = serve(server).await;
    let store = RestStore::new(url, Duration::from_millis(100));
    let err = store.list().await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout));
    assert_eq!(load_failure(&err), "Request timeout - server is not responding");
}

#[tokio::test]
async fn list_failure_reports_status() {
    let server = FakeServer {
        failures: 1,
        ..seeded(&["Acme"])
    };
    let (url, _shared) = serve(server).await;
    let store = RestStore::new(url, Duration::from_secs(5));
    let err = store.list().await.unwrap_err();
    assert_eq!(
        load_failure(&err),
        "Failed to fetch companies data: 500 Internal Server Error"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backend_worker_talks_to_rest_store() {
    let (url, _shared) = serve(seeded(&["Acme", "Globex"])).await;
    let store = RestStore::new(url, Duration::from_secs(5));
    let backend = Backend::launch(Arc::new(store)).unwrap();

    backend.commands.send(BackendCommand::LoadAll).unwrap();
    let events = backend.events.clone();
    let event = tokio::task::spawn_blocking(move || events.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, BackendEvent::Loaded(ref rows) if rows.len() == 2));

    backend.commands.send(BackendCommand::Delete { id: 9 }).unwrap();
    let events = backend.events.clone();
    let event = tokio::task::spawn_blocking(move || events.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        BackendEvent::MutationFailed {
            op: MutationOp::Delete,
            message: "Failed to delete company: 404 Not Found".into(),
        }
    );

    tokio::task::spawn_blocking(move || backend.shutdown())
        .await
        .unwrap();
}
