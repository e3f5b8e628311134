mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tenant_isolation::app::{router, AppState};
use tenant_isolation::auth::{generate_jwt, Claims};
use tenant_isolation::tenant::{Principal, TenantId};
use tower::ServiceExt;
use uuid::Uuid;

use common::Fixture;

fn app(fx: &Fixture) -> Router {
    router(AppState::new(fx.db.clone()))
}

fn token_for(principal: &Principal) -> Result<String> {
    Ok(generate_jwt(&Claims::new(principal))?)
}

fn user_token(tenant_id: TenantId) -> Result<String> {
    token_for(&Principal::tenant_user(Uuid::new_v4(), tenant_id))
}

fn admin_token() -> Result<String> {
    token_for(&Principal {
        principal_id: Uuid::new_v4(),
        tenant_id: None,
        is_platform_admin: true,
    })
}

async fn send(app: Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, json))
}

fn tenant_ids(body: &Value) -> Vec<String> {
    body["data"]["patients"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["tenant_id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let fx = Fixture::new().await?;
    let (status, body) = send(app(&fx), "GET", "/health", None, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn api_requires_a_token() -> Result<()> {
    let fx = Fixture::new().await?;

    let (status, body) = send(app(&fx), "GET", "/api/patients", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(app(&fx), "GET", "/api/patients", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn listing_returns_only_the_callers_tenant() -> Result<()> {
    let fx = Fixture::seeded(3, 2).await?;
    let token = user_token(fx.acme.id)?;

    let (status, body) = send(app(&fx), "GET", "/api/patients", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let owners = tenant_ids(&body);
    assert_eq!(owners.len(), 3);
    assert!(owners.iter().all(|t| *t == fx.acme.id.to_string()));

    let (status, body) = send(app(&fx), "GET", "/api/patients?limit=1&offset=0", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tenant_ids(&body), vec![fx.acme.id.to_string()]);
    Ok(())
}

#[tokio::test]
async fn foreign_patient_by_id_is_not_found() -> Result<()> {
    let fx = Fixture::new().await?;
    let foreign = fx.seed_patients(fx.globex.id, 1).await?.remove(0);
    let token = user_token(fx.acme.id)?;

    let uri = format!("/api/patients/{}", foreign.id);
    let (status, _) = send(app(&fx), "GET", &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let own_token = user_token(fx.globex.id)?;
    let (status, body) = send(app(&fx), "GET", &uri, Some(&own_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(foreign.id));
    Ok(())
}

#[tokio::test]
async fn created_patient_belongs_to_the_caller() -> Result<()> {
    let fx = Fixture::new().await?;
    let token = user_token(fx.globex.id)?;

    let (status, body) = send(
        app(&fx),
        "POST",
        "/api/patients",
        Some(&token),
        Some(json!({ "name": "Grace", "date_of_birth": "1906-12-09" })),
    )
    .await?;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["tenant_id"], json!(fx.globex.id));
    assert_eq!(fx.storage.raw_len("patients").await, 1);
    Ok(())
}

#[tokio::test]
async fn devices_are_tenant_filtered_too() -> Result<()> {
    let fx = Fixture::new().await?;
    fx.seed_devices(fx.acme.id, 2).await?;
    fx.seed_devices(fx.globex.id, 5).await?;
    let token = user_token(fx.globex.id)?;

    let (status, body) = send(app(&fx), "GET", "/api/devices", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 5);
    Ok(())
}

#[tokio::test]
async fn suspended_or_unknown_tenants_are_refused() -> Result<()> {
    let fx = Fixture::new().await?;

    let token = user_token(fx.suspended.id)?;
    let (status, _) = send(app(&fx), "GET", "/api/patients", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = user_token(TenantId::random())?;
    let (status, _) = send(app(&fx), "GET", "/api/patients", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn admin_listing_spans_tenants_only_for_platform_admins() -> Result<()> {
    let fx = Fixture::seeded(2, 3).await?;

    let token = user_token(fx.acme.id)?;
    let (status, _) = send(app(&fx), "GET", "/api/admin/patients", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let token = admin_token()?;
    let (status, body) = send(app(&fx), "GET", "/api/admin/patients", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["count"], 5);
    Ok(())
}

#[tokio::test]
async fn admin_without_bypass_gets_no_scoped_rows() -> Result<()> {
    let fx = Fixture::seeded(2, 3).await?;
    let token = admin_token()?;

    let (status, body) = send(app(&fx), "GET", "/api/patients", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");
    Ok(())
}
