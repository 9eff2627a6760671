//! In-process stand-in for the ORCID public API and OAuth token endpoint.
//!
//! Responses are registered per path (`{orcid}/record`, `{orcid}/work/11`, ...)
//! and shared by every test in the binary. Unregistered paths answer 404.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};

pub struct FakeOrcid {
    pub base_url: String,
}

static FAKE: OnceLock<FakeOrcid> = OnceLock::new();
static RESPONSES: OnceLock<Mutex<HashMap<String, (StatusCode, Value)>>> = OnceLock::new();

fn responses() -> &'static Mutex<HashMap<String, (StatusCode, Value)>> {
    RESPONSES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Starts the fake on its own runtime thread so it outlives individual tests.
pub fn ensure() -> &'static FakeOrcid {
    FAKE.get_or_init(|| {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind fake ORCID");
        let addr = listener.local_addr().expect("fake ORCID address");
        listener.set_nonblocking(true).expect("non-blocking listener");

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("fake ORCID runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                axum::serve(listener, router()).await.expect("fake ORCID server");
            });
        });

        FakeOrcid {
            base_url: format!("http://{}", addr),
        }
    })
}

/// Serve `body` with 200 at `/v3.0/{path}`.
pub fn respond(path: &str, body: Value) {
    responses()
        .lock()
        .expect("fake ORCID state")
        .insert(path.to_string(), (StatusCode::OK, body));
}

/// Answer `/v3.0/{path}` with an error status.
pub fn fail(path: &str, status: StatusCode) {
    responses()
        .lock()
        .expect("fake ORCID state")
        .insert(path.to_string(), (status, json!({ "error": "upstream failure" })));
}

fn router() -> Router {
    Router::new()
        .route("/v3.0/*path", get(public_api))
        .route("/oauth/token", post(token))
}

async fn public_api(Path(path): Path<String>) -> (StatusCode, Json<Value>) {
    let key = path.trim_start_matches('/');
    let found = responses().lock().expect("fake ORCID state").get(key).cloned();
    match found {
        Some((status, body)) => (status, Json(body)),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": format!("no fixture for {}", key) }))),
    }
}

/// The authorization code is the ORCID iD being signed in.
async fn token(Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    let Some(orcid) = form.get("code") else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_request" })));
    };
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "fake-access-token",
            "token_type": "bearer",
            "refresh_token": "fake-refresh-token",
            "expires_in": 631138518,
            "scope": "/authenticate",
            "name": "Josiah Carberry",
            "orcid": orcid,
        })),
    )
}

pub fn title(value: &str) -> Value {
    json!({ "title": { "value": value } })
}

pub fn year(value: i32) -> Value {
    json!({ "year": { "value": value.to_string() } })
}

pub fn work_summary(put_code: i64, name: &str, published: i32) -> Value {
    json!({
        "put-code": put_code,
        "title": title(name),
        "type": "journal-article",
        "publication-date": year(published),
    })
}

pub fn funding_summary(put_code: i64, name: &str, started: i32) -> Value {
    json!({
        "put-code": put_code,
        "title": title(name),
        "type": "grant",
        "start-date": year(started),
        "organization": { "name": "Ceramics Foundation" },
    })
}

/// Full record with the given work and funding summaries, one per group.
pub fn record(orcid: &str, works: &[Value], fundings: &[Value]) -> Value {
    json!({
        "orcid-identifier": { "path": orcid, "host": "orcid.org" },
        "person": {
            "name": {
                "given-names": { "value": "Josiah" },
                "family-name": { "value": "Carberry" },
                "credit-name": null
            },
            "biography": { "content": "Psychoceramics at Brown" },
            "keywords": { "keyword": [{ "content": "psychoceramics" }, { "content": "Psychoceramics" }] },
            "researcher-urls": { "researcher-url": [
                { "url-name": "Lab", "url": { "value": "https://example.org/lab" } }
            ] }
        },
        "activities-summary": {
            "works": { "group": works.iter().map(|w| json!({ "work-summary": [w] })).collect::<Vec<_>>() },
            "fundings": { "group": fundings.iter().map(|f| json!({ "funding-summary": [f] })).collect::<Vec<_>>() }
        }
    })
}
