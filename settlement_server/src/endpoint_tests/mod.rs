//! Endpoint tests: handlers wired into a test service with a mocked storage backend.
mod mocks;

use std::{path::PathBuf, sync::Arc};

use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use osp_common::Cents;
use serde_json::{json, Value};
use settlement_engine::{
    db_types::{Order, OrderStatus},
    traits::PlatformError,
    JobEngine,
    JobEngineConfig,
};
use uuid::Uuid;

use crate::{routes, server};
use mocks::MockPlatform;

fn engine_config() -> JobEngineConfig {
    JobEngineConfig {
        workers: 0,
        batch_size: 100,
        queue_size: 10,
        output_dir: std::env::temp_dir().join(format!("osp-endpoint-test-{}", Uuid::new_v4())),
    }
}

/// Builds a test service over the full route table with the given mock as the backend.
macro_rules! test_app {
    ($db:expr) => {{
        let db: Arc<MockPlatform> = Arc::new($db);
        let engine = Arc::new(JobEngine::new(Arc::clone(&db), engine_config()));
        let order_api = settlement_engine::OrderFlowApi::new(Arc::clone(&db));
        test::init_service(
            App::new()
                .app_data(web::Data::new(order_api))
                .app_data(web::Data::from(Arc::clone(&engine)))
                .app_data(web::Data::from(Arc::clone(&db)))
                .route("/health", web::get().to(routes::health::<MockPlatform>))
                .service(
                    web::scope("/orders")
                        .route("", web::post().to(routes::create_order::<MockPlatform>))
                        .route("", web::get().to(routes::list_orders::<MockPlatform>))
                        .route("/{id}", web::get().to(routes::get_order::<MockPlatform>)),
                )
                .service(
                    web::scope("/jobs")
                        .route("/settlement", web::post().to(routes::create_settlement_job::<MockPlatform>))
                        .route("/{id}", web::get().to(routes::get_job::<MockPlatform>))
                        .route("/{id}/cancel", web::post().to(routes::cancel_job::<MockPlatform>)),
                )
                .route("/downloads/{filename}", web::get().to(routes::download_settlement::<MockPlatform>)),
        )
        .await
    }};
}

fn confirmed_order(total: i64) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        product_id: 1,
        buyer_id: "buyer_1".to_string(),
        quantity: 2,
        status: OrderStatus::Confirmed,
        total_cents: Cents::new(total),
        created_at: now,
        updated_at: now,
        product: None,
    }
}

#[actix_web::test]
async fn health_reports_healthy_database() {
    let mut db = MockPlatform::new();
    db.expect_health_check().returning(|| Ok(()));
    let app = test_app!(db);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"], "healthy");
}

#[actix_web::test]
async fn health_reports_unreachable_database() {
    let mut db = MockPlatform::new();
    db.expect_health_check()
        .returning(|| Err(PlatformError::Internal("database health check timed out".into())));
    let app = test_app!(db);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "unhealthy");
}

#[actix_web::test]
async fn order_placement_returns_201_with_the_captured_total() {
    let mut db = MockPlatform::new();
    db.expect_place_order().returning(|_| Ok(confirmed_order(2000)));
    let app = test_app!(db);

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(json!({"product_id": 1, "quantity": 2, "buyer_id": "buyer_1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_cents"], 2000);
    assert_eq!(body["status"], "CONFIRMED");
}

#[actix_web::test]
async fn zero_quantity_is_a_validation_error() {
    // No storage expectation: validation must reject the request first.
    let db = MockPlatform::new();
    let app = test_app!(db);

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(json!({"product_id": 1, "quantity": 0, "buyer_id": "buyer_1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn out_of_stock_maps_to_409() {
    let mut db = MockPlatform::new();
    db.expect_place_order().returning(|_| Err(PlatformError::OutOfStock));
    let app = test_app!(db);

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(json!({"product_id": 1, "quantity": 5, "buyer_id": "buyer_1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "OUT_OF_STOCK");
}

#[actix_web::test]
async fn unknown_job_is_a_404_with_job_not_found() {
    let mut db = MockPlatform::new();
    db.expect_fetch_job().returning(|_| Err(PlatformError::JobNotFound));
    let app = test_app!(db);

    let req = test::TestRequest::get().uri(&format!("/jobs/{}", Uuid::new_v4())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");
}

#[actix_web::test]
async fn job_submission_is_acknowledged_with_202() {
    let mut db = MockPlatform::new();
    db.expect_create_job().returning(|_| Ok(()));
    let app = test_app!(db);

    let req = test::TestRequest::post()
        .uri("/jobs/settlement")
        .set_json(json!({"from": "2025-06-01", "to": "2025-06-03"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "QUEUED");
    assert!(body["job_id"].as_str().unwrap().parse::<Uuid>().is_ok());
}

#[actix_web::test]
async fn cancel_after_terminal_is_409_and_idempotent() {
    let mut db = MockPlatform::new();
    db.expect_cancel_job().returning(|_| Err(PlatformError::JobAlreadyCancelled));
    let app = test_app!(db);

    let req = test::TestRequest::post().uri(&format!("/jobs/{}/cancel", Uuid::new_v4())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "JOB_ALREADY_CANCELLED");
}

#[actix_web::test]
async fn download_rejects_non_report_filenames() {
    let db = MockPlatform::new();
    let app = test_app!(db);

    let req = test::TestRequest::get().uri("/downloads/secrets.csv").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn download_of_a_missing_report_is_file_not_found() {
    let db = MockPlatform::new();
    let app = test_app!(db);

    let req = test::TestRequest::get().uri(&format!("/downloads/{}.csv", Uuid::new_v4())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "FILE_NOT_FOUND");
}

#[actix_web::test]
async fn malformed_json_bodies_use_the_error_shape() {
    let db = MockPlatform::new();
    let db: Arc<MockPlatform> = Arc::new(db);
    let engine = Arc::new(JobEngine::new(Arc::clone(&db), engine_config()));
    let order_api = settlement_engine::OrderFlowApi::new(Arc::clone(&db));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::from(Arc::clone(&engine)))
            .app_data(web::Data::from(Arc::clone(&db)))
            .app_data(web::JsonConfig::default().error_handler(server::json_error_handler))
            .service(web::scope("/orders").route("", web::post().to(routes::create_order::<MockPlatform>))),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn listing_echoes_the_applied_paging() {
    let mut db = MockPlatform::new();
    db.expect_fetch_orders()
        .withf(|limit, offset| *limit == 100 && *offset == 0)
        .returning(|_, _| Ok(vec![]));
    let app = test_app!(db);

    // limit=500 clamps to 100, offset=-3 floors to 0.
    let req = test::TestRequest::get().uri("/orders?limit=500&offset=-3").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["limit"], 100);
    assert_eq!(body["offset"], 0);
    assert!(body["orders"].as_array().unwrap().is_empty());
}

fn write_report(dir: &PathBuf, id: Uuid) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{id}.csv"));
    std::fs::write(&path, "merchant_id,date\n").unwrap();
    path
}

#[actix_web::test]
async fn download_streams_an_existing_report() {
    let db = MockPlatform::new();
    let db: Arc<MockPlatform> = Arc::new(db);
    let config = engine_config();
    let dir = config.output_dir.clone();
    let engine = Arc::new(JobEngine::new(Arc::clone(&db), config));
    let id = Uuid::new_v4();
    write_report(&dir, id);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(Arc::clone(&engine)))
            .app_data(web::Data::from(Arc::clone(&db)))
            .route("/downloads/{filename}", web::get().to(routes::download_settlement::<MockPlatform>)),
    )
    .await;

    let req = test::TestRequest::get().uri(&format!("/downloads/{id}.csv")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/octet-stream");
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"merchant_id,date\n");

    std::fs::remove_dir_all(&dir).ok();
}
