//! End-to-end scenarios against the mTLS and patient-facing routers, built
//! in-process via `tower::ServiceExt::oneshot` rather than binding a real
//! socket (§10's test-tooling stack). `ConnectInfo<ClientCertInfo>` is
//! inserted directly on the request as an extension, standing in for what
//! `axum-server`'s rustls acceptor would normally populate from the live TLS
//! session — the extractor under test only ever reads that extension, never
//! the transport it came from.

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use coordinator_api::identity::ClientCertInfo;
use coordinator_api::{mtls_router, AppState};
use referral_core::db::CoordinatorRepository;
use referral_core::domain::Hospital;
use serde_json::{json, Value};
use tower::ServiceExt;

const H1: (&str, &str, &str) = ("1111", "First Government Hospital", "aaa1");
const H2: (&str, &str, &str) = ("2222", "Second Private Hospital", "bbb2");
const H3: (&str, &str, &str) = ("3333", "Third Military Hospital", "ccc3");

fn setup() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let repo = CoordinatorRepository::open_in_memory().unwrap();
    for (id, name, serial) in [H1, H2, H3] {
        repo.upsert_hospital(&Hospital {
            hospital_id: id.into(),
            name: name.into(),
            cert_serial: serial.into(),
        })
        .unwrap();
    }
    let state = AppState::new(
        repo,
        dir.path().join("chunks"),
        dir.path().join("payloads"),
    );
    (state, dir)
}

fn mtls_request(method: &str, uri: &str, serial: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(serial) = serial {
        builder = builder.extension(ConnectInfo(ClientCertInfo(Some(serial.to_string()))));
    } else {
        builder = builder.extension(ConnectInfo(ClientCertInfo(None)));
    }
    if body.is_null() {
        builder
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap()
    } else {
        builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }
}

fn patient_fields() -> Value {
    json!({
        "citizenId": "c",
        "prefix": "mr",
        "firstName": "a",
        "lastName": "b",
        "birthDate": "2006-02-01",
        "address": "",
        "gender": "male",
        "telephone": "0000000000",
        "email": "b@a.b",
    })
}

fn create_referral_body(origin: &str, destination: &str) -> Value {
    let mut body = json!({
        "origin": origin,
        "destination": destination,
        "department": "cardiology",
        "reason": "checkup",
    });
    body.as_object_mut()
        .unwrap()
        .extend(patient_fields().as_object().unwrap().clone());
    // the wire DTO uses snake_case field names throughout, not a PascalCase
    // or camelCase override, so normalize the patient fields accordingly.
    let obj = body.as_object_mut().unwrap();
    for (camel, snake) in [
        ("citizenId", "citizen_id"),
        ("firstName", "first_name"),
        ("lastName", "last_name"),
        ("birthDate", "birth_date"),
    ] {
        if let Some(v) = obj.remove(camel) {
            obj.insert(snake.to_string(), v);
        }
    }
    body
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// S1 (happy path), restricted to the coordinator's own responsibilities:
/// create -> consent -> grant -> chunked upload -> complete -> download,
/// asserting the assembled file at the destination is byte-exact (invariant
/// #5) and that `/upload/complete` only succeeds once every chunk's checksum
/// matched (invariant #3).
#[tokio::test]
async fn happy_path_create_grant_upload_download_complete() {
    let (state, _dir) = setup();
    let router = mtls_router(state.clone());

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            "/",
            Some(H1.2),
            create_referral_body(H1.0, H2.0),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_i64().unwrap();

    state.repo.consent(id, "c").unwrap();

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/grant"),
            Some(H2.2),
            json!({"Granted": true}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let chunk_a = b"hello ".to_vec();
    let chunk_b = b"referral ".to_vec();
    let chunk_c = b"world".to_vec();
    let assembled: Vec<u8> = [chunk_a.clone(), chunk_b.clone(), chunk_c.clone()].concat();
    let whole_checksum = referral_core::crypto::sha256_hex(&assembled);

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/upload"),
            Some(H1.2),
            json!({"PayloadKey": "key", "Files": [{"Name": "a", "Checksum": whole_checksum}]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let chunks = [chunk_a, chunk_b, chunk_c];
    let chunk_specs: Vec<Value> = chunks
        .iter()
        .map(|c| {
            json!({
                "Checksum": referral_core::crypto::sha256_hex(c),
                "SizeKB": 1,
            })
        })
        .collect();
    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/upload/begin"),
            Some(H1.2),
            json!({"ChunkFiles": [{"Name": "a", "Chunks": chunk_specs}]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    for (index, chunk) in chunks.iter().enumerate() {
        let req = Request::builder()
            .method("POST")
            .uri(format!("/{id}/upload/file/a/{index}"))
            .extension(ConnectInfo(ClientCertInfo(Some(H1.2.to_string()))))
            .body(Body::from(chunk.clone()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "chunk {index} rejected");
    }

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/upload/complete"),
            Some(H1.2),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "GET",
            &format!("/{id}/download/a"),
            Some(H2.2),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let downloaded = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(downloaded.as_ref(), assembled.as_slice());

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/complete"),
            Some(H2.2),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let referral = state.repo.get_referral(id).unwrap();
    assert_eq!(referral.status.as_str(), "Complete");
}

/// S2: a denied grant blocks any subsequent upload attempt.
#[tokio::test]
async fn grant_deny_blocks_subsequent_upload() {
    let (state, _dir) = setup();
    let router = mtls_router(state.clone());

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            "/",
            Some(H1.2),
            create_referral_body(H1.0, H2.0),
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_i64().unwrap();
    state.repo.consent(id, "c").unwrap();

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/grant"),
            Some(H2.2),
            json!({"Granted": false}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.repo.get_referral(id).unwrap().status.as_str(), "NotGranted");

    let resp = router
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/upload"),
            Some(H1.2),
            json!({"PayloadKey": "key", "Files": []}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// S4: granting a referral that hasn't been consented to yet is an illegal
/// transition.
#[tokio::test]
async fn grant_before_consent_is_illegal_state() {
    let (state, _dir) = setup();
    let router = mtls_router(state.clone());

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            "/",
            Some(H1.2),
            create_referral_body(H1.0, H2.0),
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_i64().unwrap();

    let resp = router
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/grant"),
            Some(H2.2),
            json!({"Granted": true}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// S5: a third hospital with no stake in the referral cannot grant it.
#[tokio::test]
async fn cross_hospital_grant_is_rejected() {
    let (state, _dir) = setup();
    let router = mtls_router(state.clone());

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            "/",
            Some(H1.2),
            create_referral_body(H1.0, H2.0),
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_i64().unwrap();
    state.repo.consent(id, "c").unwrap();

    let resp = router
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/grant"),
            Some(H3.2),
            json!({"Granted": true}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Invariant #4: a second chunk upload for the same (referral, file, index)
/// triple after it already succeeded is rejected, not silently re-accepted.
#[tokio::test]
async fn duplicate_chunk_upload_after_success_is_rejected() {
    let (state, _dir) = setup();
    let router = mtls_router(state.clone());

    let resp = router
        .clone()
        .oneshot(mtls_request(
            "POST",
            "/",
            Some(H1.2),
            create_referral_body(H1.0, H2.0),
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_i64().unwrap();
    state.repo.consent(id, "c").unwrap();
    router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/grant"),
            Some(H2.2),
            json!({"Granted": true}),
        ))
        .await
        .unwrap();

    let chunk = b"payload".to_vec();
    let checksum = referral_core::crypto::sha256_hex(&chunk);
    router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/upload"),
            Some(H1.2),
            json!({"PayloadKey": "key", "Files": [{"Name": "a", "Checksum": checksum}]}),
        ))
        .await
        .unwrap();
    router
        .clone()
        .oneshot(mtls_request(
            "POST",
            &format!("/{id}/upload/begin"),
            Some(H1.2),
            json!({"ChunkFiles": [{"Name": "a", "Chunks": [{"Checksum": checksum, "SizeKB": 1}]}]}),
        ))
        .await
        .unwrap();

    let upload_once = |chunk: Vec<u8>| {
        Request::builder()
            .method("POST")
            .uri(format!("/{id}/upload/file/a/0"))
            .extension(ConnectInfo(ClientCertInfo(Some(H1.2.to_string()))))
            .body(Body::from(chunk))
            .unwrap()
    };

    let resp = router.clone().oneshot(upload_once(chunk.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router.oneshot(upload_once(chunk)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/// Invariant #7: an unregistered certificate serial is rejected on every
/// mTLS endpoint, not just the ones that happen to look up a hospital row.
#[tokio::test]
async fn unregistered_cert_serial_is_rejected_everywhere() {
    let (state, _dir) = setup();
    let router = mtls_router(state);

    for (method, uri) in [("GET", "/incoming"), ("GET", "/outgoing"), ("GET", "/hospitals")] {
        let resp = router
            .clone()
            .oneshot(mtls_request(method, uri, Some("not-a-registered-serial"), Value::Null))
            .await
            .unwrap();
        assert_eq!(
            resp.status(),
            StatusCode::BAD_REQUEST,
            "{method} {uri} should reject an unregistered serial"
        );
    }

    let resp = router
        .oneshot(mtls_request("GET", "/incoming", None, Value::Null))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
