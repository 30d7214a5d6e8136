use authorization_service::domain::privilege::PRIV_SYSADMIN;
use authorization_service::domain::privilege_set::PrivilegeSet;
use authorization_service::interface::http_handlers::{
    create_privilege_set_handler, delete_privilege_set_handler, evaluate_handler,
    export_privilege_set_xml_handler, get_privilege_set_handler, import_privilege_set_xml_handler,
    list_privilege_sets_handler, satisfiability_handler, update_privilege_set_handler,
};
use authorization_service::test_utils::{
    PUBLISHED_FIELD, create_test_app_state, create_test_record, create_test_user,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_router() -> Router {
    let state = create_test_app_state(
        vec![
            create_test_user(1, vec![PRIV_SYSADMIN]),
            create_test_user(2, vec![]),
        ],
        vec![create_test_record(100)],
    );
    Router::new()
        .route("/v1/authz/evaluate", axum::routing::post(evaluate_handler))
        .route(
            "/v1/authz/satisfiability",
            axum::routing::post(satisfiability_handler),
        )
        .route(
            "/v1/authz/privilege-sets",
            axum::routing::post(create_privilege_set_handler),
        )
        .route(
            "/v1/authz/privilege-sets",
            axum::routing::get(list_privilege_sets_handler),
        )
        .route(
            "/v1/authz/privilege-sets/import-xml",
            axum::routing::post(import_privilege_set_xml_handler),
        )
        .route(
            "/v1/authz/privilege-sets/{set_id}",
            axum::routing::get(get_privilege_set_handler),
        )
        .route(
            "/v1/authz/privilege-sets/{set_id}",
            axum::routing::put(update_privilege_set_handler),
        )
        .route(
            "/v1/authz/privilege-sets/{set_id}",
            axum::routing::delete(delete_privilege_set_handler),
        )
        .route(
            "/v1/authz/privilege-sets/{set_id}/xml",
            axum::routing::get(export_privilege_set_xml_handler),
        )
        .with_state(state)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let req = match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_evaluate_inline_set_checks_privileges() {
    let app = test_router();
    let mut set = PrivilegeSet::new();
    set.add_privilege(PRIV_SYSADMIN);

    let (status, body) = request(
        &app,
        "POST",
        "/v1/authz/evaluate",
        Some(json!({ "data": set.data(), "user_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["satisfied"], true);

    let (status, body) = request(
        &app,
        "POST",
        "/v1/authz/evaluate",
        Some(json!({ "data": set.data(), "user_id": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["satisfied"], false);
}

#[tokio::test]
async fn test_evaluate_rejects_bad_requests() {
    let app = test_router();

    let (status, _) = request(&app, "POST", "/v1/authz/evaluate", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "POST",
        "/v1/authz/evaluate",
        Some(json!({ "data": "not a snapshot" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "POST",
        "/v1/authz/evaluate",
        Some(json!({ "set_id": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let set = PrivilegeSet::new();
    let (status, _) = request(
        &app,
        "POST",
        "/v1/authz/evaluate",
        Some(json!({ "data": set.data(), "user_id": 404 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stored_set_lifecycle() {
    let app = test_router();
    let mut set = PrivilegeSet::new();
    set.add_privilege(PRIV_SYSADMIN);

    let (status, created) = request(
        &app,
        "POST",
        "/v1/authz/privilege-sets",
        Some(json!({ "name": "Editing", "data": set.data() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) =
        request(&app, "GET", &format!("/v1/authz/privilege-sets/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Editing");

    // Evaluating by stored id works end to end.
    let (status, body) = request(
        &app,
        "POST",
        "/v1/authz/evaluate",
        Some(json!({ "set_id": id, "user_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["satisfied"], true);

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/v1/authz/privilege-sets/{id}"),
        Some(json!({ "name": "Editing v2", "data": set.data() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = request(&app, "GET", "/v1/authz/privilege-sets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["sets"].as_array().unwrap().len(), 1);
    assert_eq!(listed["sets"][0]["name"], "Editing v2");

    let (status, _) =
        request(&app, "DELETE", &format!("/v1/authz/privilege-sets/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) =
        request(&app, "DELETE", &format!("/v1/authz/privilege-sets/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rejects_malformed_snapshot() {
    let app = test_router();
    let (status, _) = request(
        &app,
        "POST",
        "/v1/authz/privilege-sets",
        Some(json!({ "name": "Broken", "data": "{}" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_xml_import_and_export() {
    let app = test_router();
    let xml = r#"
        <PrivilegeSet>
            <AddPrivilege>PRIV_SYSADMIN</AddPrivilege>
            <AddCondition>
                <Field>View Count</Field>
                <Operator>&gt;</Operator>
                <Value>10</Value>
            </AddCondition>
        </PrivilegeSet>
    "#;

    let (status, created) = request(
        &app,
        "POST",
        "/v1/authz/privilege-sets/import-xml",
        Some(json!({ "name": "From XML", "xml": xml })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let restored = PrivilegeSet::from_data(created["data"].as_str().unwrap()).unwrap();
    assert!(restored.includes_privilege(PRIV_SYSADMIN));
    assert_eq!(restored.conditions(false).len(), 1);

    let (status, exported) = request(
        &app,
        "GET",
        &format!("/v1/authz/privilege-sets/{id}/xml"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let exported_xml = exported["xml"].as_str().unwrap();
    assert!(exported_xml.contains("PRIV_SYSADMIN"));
    assert!(exported_xml.contains("View Count"));

    let (status, _) = request(
        &app,
        "POST",
        "/v1/authz/privilege-sets/import-xml",
        Some(json!({ "name": "Bad", "xml": "<PrivilegeSet><Nope>1</Nope></PrivilegeSet>" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_satisfiability_endpoint_counts_records() {
    // One record, nothing published: the flag condition cannot be satisfied.
    let state = create_test_app_state(vec![], vec![create_test_record(100)]);
    let app = Router::new()
        .route(
            "/v1/authz/satisfiability",
            axum::routing::post(satisfiability_handler),
        )
        .with_state(state);

    let (status, body) = request(
        &app,
        "POST",
        "/v1/authz/satisfiability",
        Some(json!({
            "condition": { "field_id": PUBLISHED_FIELD, "operator": "==", "value": "TRUE" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["satisfiable"], false);

    let (status, _) = request(
        &app,
        "POST",
        "/v1/authz/satisfiability",
        Some(json!({
            "condition": { "field_id": PUBLISHED_FIELD, "operator": "~", "value": "TRUE" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
