// Tests for the HTTP surface:
// - handler responses and error envelopes, invoked directly
// - the auth layer over the full router (401/403, role split, open paths)
// - CORS preflight passing without credentials

mod test_helpers;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::Json;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use shark_attack_api::api_router;
use shark_attack_api::handlers::events::EventQuery;
use shark_attack_api::handlers::shark_attacks::{
    CreateSharkAttackRequest, DeleteSharkAttacksRequest, GetParams, ListParams,
    UpdateSharkAttackRequest,
};
use shark_attack_api::handlers::{
    create_shark_attack, delete_shark_attacks, get_events, get_shark_attack, import_shark_attacks,
    list_shark_attacks, update_shark_attack,
};
use shark_attack_api::middleware::auth::{Claims, READ_ROLE, WRITE_ROLE};
use shark_attack_api::models::{DomainEvent, ModType, SharkAttackFields};
use shark_attack_api::services::event_log::EventLog;
use test_helpers::*;
use tower::ServiceExt;

fn list_params() -> ListParams {
    ListParams {
        organization_id: None,
        name: None,
        active: None,
        page: None,
        count: None,
        sort_field: None,
        sort_asc: None,
        query_total_result_count: None,
    }
}

// ---------------------------------------------------------------------------
// Handlers invoked directly

#[tokio::test]
async fn test_list_handler_returns_listing_and_optional_total() {
    let h = harness();
    h.store.seed(stored_record("1"));
    h.store.seed(stored_record("2"));
    let state = app_state(&h);

    let params = ListParams {
        count: Some(1),
        query_total_result_count: Some(true),
        ..list_params()
    };
    let Json(body) = list_shark_attacks(Query(params), State(state.clone()))
        .await
        .expect("list should succeed");

    assert_eq!(body.listing.len(), 1);
    assert_eq!(body.query_total_result_count, Some(2));

    let Json(body) = list_shark_attacks(Query(list_params()), State(state))
        .await
        .expect("list should succeed");
    assert_eq!(body.listing.len(), 2);
    assert_eq!(body.query_total_result_count, None);
}

#[tokio::test]
async fn test_get_handler_returns_record_or_not_found_envelope() {
    let h = harness();
    h.store.seed(stored_record("a1"));
    let state = app_state(&h);

    let Json(record) = get_shark_attack(
        Path("a1".to_string()),
        Query(GetParams { organization_id: None }),
        State(state.clone()),
    )
    .await
    .expect("get should succeed");
    assert_eq!(record.id, "a1");

    let (status, Json(body)) = get_shark_attack(
        Path("ghost".to_string()),
        Query(GetParams { organization_id: None }),
        State(state),
    )
    .await
    .expect_err("missing record should 404");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_handler_returns_created() {
    let h = harness();
    let state = app_state(&h);

    let payload = CreateSharkAttackRequest {
        id: None,
        organization_id: None,
        active: None,
        fields: SharkAttackFields {
            country: Some("AUSTRALIA".to_string()),
            ..Default::default()
        },
    };
    let (status, Json(record)) = create_shark_attack(
        State(state),
        auth_user_extension("alice", &[WRITE_ROLE]),
        Json(payload),
    )
    .await
    .expect("create should succeed");

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record.fields.country.as_deref(), Some("AUSTRALIA"));
    assert_eq!(h.event_log.all()[0].user, "alice");
}

#[tokio::test]
async fn test_created_record_is_readable_and_listed() {
    let h = harness();
    let state = app_state(&h);

    let payload = CreateSharkAttackRequest {
        id: Some("rt-1".to_string()),
        organization_id: None,
        active: None,
        fields: SharkAttackFields {
            country: Some("BAHAMAS".to_string()),
            name: Some("Round Tripper".to_string()),
            ..Default::default()
        },
    };
    let (status, Json(created)) = create_shark_attack(
        State(state.clone()),
        auth_user_extension("alice", &[WRITE_ROLE]),
        Json(payload),
    )
    .await
    .expect("create should succeed");
    assert_eq!(status, StatusCode::CREATED);

    let Json(fetched) = get_shark_attack(
        Path(created.id.clone()),
        Query(GetParams { organization_id: None }),
        State(state.clone()),
    )
    .await
    .expect("created record should be readable");
    assert_eq!(fetched.id, "rt-1");
    assert_eq!(fetched.fields.country.as_deref(), Some("BAHAMAS"));

    let Json(body) = list_shark_attacks(Query(list_params()), State(state))
        .await
        .expect("list should succeed");
    assert!(body.listing.iter().any(|r| r.id == "rt-1"));
}

#[tokio::test]
async fn test_update_handler_not_found_envelope() {
    let h = harness();
    let state = app_state(&h);

    let payload = UpdateSharkAttackRequest {
        organization_id: None,
        merge: None,
        active: None,
        fields: SharkAttackFields::default(),
    };
    let (status, Json(body)) = update_shark_attack(
        Path("ghost".to_string()),
        State(state),
        auth_user_extension("bob", &[WRITE_ROLE]),
        Json(payload),
    )
    .await
    .expect_err("missing record should 404");

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_delete_handler_reports_deleted_and_not_found() {
    let h = harness();
    h.store.seed(stored_record("1"));
    h.store.seed(stored_record("2"));
    let state = app_state(&h);

    let payload = DeleteSharkAttacksRequest {
        ids: vec!["1".to_string(), "2".to_string()],
        organization_id: None,
    };
    let (status, Json(body)) = delete_shark_attacks(
        State(state.clone()),
        auth_user_extension("carol", &[WRITE_ROLE]),
        Json(payload),
    )
    .await
    .expect("delete should succeed");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.code, 200);
    assert_eq!(
        body.message,
        "SharkAttack with id:s [\"1\",\"2\"] has been deleted"
    );

    // Same ids again: nothing left to remove.
    let payload = DeleteSharkAttacksRequest {
        ids: vec!["1".to_string(), "2".to_string()],
        organization_id: None,
    };
    let (status, Json(body)) = delete_shark_attacks(
        State(state),
        auth_user_extension("carol", &[WRITE_ROLE]),
        Json(payload),
    )
    .await
    .expect("delete of absent rows still answers");

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, 400);
    assert_eq!(
        body.message,
        "SharkAttack with id:s [\"1\",\"2\"] not found for deletion"
    );
}

#[tokio::test]
async fn test_delete_handler_declines_empty_ids() {
    let h = harness();
    let state = app_state(&h);

    let payload = DeleteSharkAttacksRequest {
        ids: Vec::new(),
        organization_id: None,
    };
    let (status, Json(body)) = delete_shark_attacks(
        State(state),
        auth_user_extension("carol", &[WRITE_ROLE]),
        Json(payload),
    )
    .await
    .expect_err("empty ids should be declined");

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert!(h.event_log.all().is_empty());
}

#[tokio::test]
async fn test_import_handler_returns_summary() {
    let h = harness_with_dataset(FixedDataset::with_page(vec![
        flat_record(1, "AUSTRALIA"),
        flat_record(2, "USA"),
    ]));
    let state = app_state(&h);

    let Json(summary) =
        import_shark_attacks(State(state), auth_user_extension("alice", &[WRITE_ROLE]))
            .await
            .expect("import should succeed");

    assert_eq!(summary.ids, vec!["1", "2"]);
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn test_import_handler_maps_fetch_failure_to_bad_gateway() {
    let dataset = FixedDataset::new();
    dataset.push_failure(503);
    let h = harness_with_dataset(dataset);
    let state = app_state(&h);

    let (status, Json(body)) =
        import_shark_attacks(State(state), auth_user_extension("alice", &[WRITE_ROLE]))
            .await
            .expect_err("fetch failure should surface");

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "DATASET_FETCH_FAILED");
}

#[tokio::test]
async fn test_events_handler_filters_and_orders_newest_first() {
    let h = harness();
    let first = DomainEvent::modified(ModType::Create, "1", json!({}), "alice");
    let second = DomainEvent::reported("1", json!({ "id": "1" }));
    h.event_log.append(&first).await.expect("append");
    h.event_log.append(&second).await.expect("append");
    let state = app_state(&h);

    let query = EventQuery {
        limit: None,
        offset: None,
        event_type: None,
        aggregate_type: None,
        aggregate_id: None,
    };
    let Json(events) = get_events(Query(query), State(state.clone()))
        .await
        .expect("events read should succeed");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "Reported");
    assert_eq!(events[1].event_type, "SharkAttackModified");

    let query = EventQuery {
        limit: None,
        offset: None,
        event_type: Some("Reported".to_string()),
        aggregate_type: None,
        aggregate_id: None,
    };
    let Json(events) = get_events(Query(query), State(state))
        .await
        .expect("events read should succeed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].aggregate_type, "SharkAttact");
}

// ---------------------------------------------------------------------------
// Auth layer over the full router

#[tokio::test]
async fn test_router_declines_requests_without_a_token() {
    let h = harness();
    let app = api_router(app_state(&h));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/shark-attacks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_router_declines_non_bearer_authorization() {
    let h = harness();
    let app = api_router(app_state(&h));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/shark-attacks")
                .header(header::AUTHORIZATION, "Token abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_router_declines_expired_tokens() {
    let h = harness();
    let app = api_router(app_state(&h));

    let claims = Claims {
        preferred_username: "alice".to_string(),
        roles: vec![READ_ROLE.to_string()],
        exp: 1000,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_ref()),
    )
    .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/shark-attacks")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_read_role_reads_but_cannot_write() {
    let h = harness();
    let app = api_router(app_state(&h));
    let token = make_token("alice", &[READ_ROLE]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/shark-attacks")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/shark-attacks")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_write_role_writes_but_cannot_read() {
    let h = harness();
    let app = api_router(app_state(&h));
    let token = make_token("bob", &[WRITE_ROLE]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/shark-attacks")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"country":"AUSTRALIA"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The roles are independent grants.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/shark-attacks")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_stays_open() {
    let h = harness();
    let app = api_router(app_state(&h));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight_passes_without_credentials() {
    let h = harness();
    let app = api_router(app_state(&h));

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/shark-attacks")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_events_endpoint_requires_the_read_role() {
    let h = harness();
    let app = api_router(app_state(&h));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = make_token("alice", &[READ_ROLE]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/events")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
