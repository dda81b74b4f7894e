//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Auth endpoints (register, login, logout, me)
//! - Catalog endpoints (brands, types, models)
//! - Condition endpoints
//! - Inventory CRUD endpoints
//! - CSV import endpoint
//!
//! Stored images are served from the upload root under its public prefix.

pub mod auth;
pub mod catalog;
pub mod conditions;
pub mod import;
pub mod inventories;
pub mod middleware;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::config::Config;
use crate::db::repositories::{
    SqlxCatalogRepository, SqlxConditionRepository, SqlxInventoryRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::import::{ImageAcquirer, ImageFetcher, ImageStore, InventoryImporter};
use crate::services::{CatalogService, InventoryService, UserService};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Wire repositories, services and the importer over `pool`.
pub fn build_state(
    pool: DynDatabasePool,
    config: &Config,
    fetcher: Arc<dyn ImageFetcher>,
) -> AppState {
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let catalog_repo = SqlxCatalogRepository::boxed(pool.clone());
    let condition_repo = SqlxConditionRepository::boxed(pool.clone());
    let inventory_repo = SqlxInventoryRepository::boxed(pool);

    let images = ImageAcquirer::new(
        fetcher,
        ImageStore::new(&config.upload, config.import.thumbnail_size),
    );
    let importer = InventoryImporter::new(
        inventory_repo.clone(),
        catalog_repo.clone(),
        user_repo.clone(),
        images,
        config.import.year_fallback,
    );

    AppState {
        user_service: Arc::new(UserService::new(user_repo, session_repo)),
        catalog_service: Arc::new(CatalogService::new(
            catalog_repo.clone(),
            condition_repo.clone(),
        )),
        inventory_service: Arc::new(InventoryService::new(
            inventory_repo,
            catalog_repo,
            condition_repo,
        )),
        importer: Arc::new(importer),
        upload_config: Arc::new(config.upload.clone()),
        import_config: Arc::new(config.import.clone()),
    }
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a session)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .nest("/catalog", catalog::router())
        .merge(inventories::router())
        .merge(conditions::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Import and registration see the user when there is one
    let optional_routes = Router::new()
        .merge(auth::public_router())
        .merge(import::router(state.import_config.max_csv_size))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    Router::new().merge(optional_routes).merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin '{}'", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let uploads_route = format!("/{}", state.upload_config.public_prefix.trim_matches('/'));
    let uploads = ServeDir::new(&state.upload_config.path);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service(&uploads_route, uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::db::{create_test_pool, migrations};
    use crate::import::images::tests::StaticFetcher;
    use crate::models::CreateModelInput;
    use crate::services::RegisterInput;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tempfile::TempDir;

    pub(crate) const ADMIN: &str = "admin";
    pub(crate) const ADMIN_PASSWORD: &str = "admin-password";

    /// Server over an in-memory database with one admin account and a
    /// Toyota / Camioneta / Hilux 2020 catalog entry.
    pub(crate) async fn test_server() -> (TestServer, TempDir) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let uploads = tempfile::tempdir().unwrap();
        let config = Config {
            upload: UploadConfig {
                path: uploads.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        };
        let fetcher = Arc::new(StaticFetcher {
            bodies: HashMap::new(),
        });
        let state = build_state(pool, &config, fetcher);

        state
            .user_service
            .register(
                RegisterInput::new(ADMIN, "admin@example.com", ADMIN_PASSWORD),
                None,
            )
            .await
            .unwrap();
        let brand = state.catalog_service.create_brand("Toyota").await.unwrap();
        let kind = state.catalog_service.create_type("Camioneta").await.unwrap();
        state
            .catalog_service
            .create_model(CreateModelInput {
                name: "Hilux".to_string(),
                year: 2020,
                brand_id: brand.id,
                type_id: kind.id,
            })
            .await
            .unwrap();

        let app = build_router(state, &config.server.cors_origin).unwrap();
        (TestServer::new(app).unwrap(), uploads)
    }

    pub(crate) async fn login_token(server: &TestServer) -> String {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({
                "username_or_email": ADMIN,
                "password": ADMIN_PASSWORD,
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let (server, _uploads) = test_server().await;

        server
            .get("/api/v1/inventories")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/v1/auth/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_then_me() {
        let (server, _uploads) = test_server().await;
        let token = login_token(&server).await;

        let response = server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["username"], ADMIN);
        assert_eq!(body["role"], "admin");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (server, _uploads) = test_server().await;

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({"username_or_email": ADMIN, "password": "nope"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_requires_admin_after_first_user() {
        let (server, _uploads) = test_server().await;
        let body = json!({
            "username": "operador",
            "email": "operador@example.com",
            "password": "secreto",
        });

        server
            .post("/api/v1/auth/register")
            .json(&body)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let token = login_token(&server).await;
        let response = server
            .post("/api/v1/auth/register")
            .authorization_bearer(&token)
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        assert_eq!(created["role"], "user");
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (server, _uploads) = test_server().await;
        let token = login_token(&server).await;

        server
            .post("/api/v1/auth/logout")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let (server, _uploads) = test_server().await;
        let token = login_token(&server).await;

        let response = server
            .post("/api/v1/catalog/brands")
            .authorization_bearer(&token)
            .json(&json!({"name": "Nissan"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        server
            .post("/api/v1/catalog/brands")
            .authorization_bearer(&token)
            .json(&json!({"name": "Nissan"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let models: Value = server
            .get("/api/v1/catalog/models")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(models[0]["name"], "Hilux");
        assert_eq!(models[0]["type"]["name"], "Camioneta");
    }

    #[tokio::test]
    async fn test_inventory_crud() {
        let (server, _uploads) = test_server().await;
        let token = login_token(&server).await;
        let models: Value = server
            .get("/api/v1/catalog/models")
            .authorization_bearer(&token)
            .await
            .json();
        let model_id = models[0]["id"].as_i64().unwrap();

        let response = server
            .post("/api/v1/inventories")
            .authorization_bearer(&token)
            .json(&json!({
                "modelId": model_id,
                "serialNumber": "SN-100",
                "receptionDate": "2024-01-15",
                "status": "ALTA",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        let id = created["id"].as_i64().unwrap();

        let updated: Value = server
            .put(&format!("/api/v1/inventories/{}", id))
            .authorization_bearer(&token)
            .json(&json!({"status": "BAJA"}))
            .await
            .json();
        assert_eq!(updated["status"], "BAJA");
        assert_eq!(updated["serialNumber"], "SN-100");

        let condition: Value = server
            .post("/api/v1/conditions")
            .authorization_bearer(&token)
            .json(&json!({"name": "Golpeado"}))
            .await
            .json();
        server
            .post(&format!("/api/v1/inventories/{}/conditions", id))
            .authorization_bearer(&token)
            .json(&json!({"conditionId": condition["id"], "comments": "Puerta"}))
            .await
            .assert_status(StatusCode::CREATED);

        let detail: Value = server
            .get(&format!("/api/v1/inventories/{}", id))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(detail["conditions"][0]["condition"]["name"], "Golpeado");

        server
            .delete(&format!("/api/v1/inventories/{}", id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/v1/inventories/{}", id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
