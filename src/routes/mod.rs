use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod devices;
pub mod health;
pub mod jobs;
pub mod reports;
pub mod scans;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let devices_routes = Router::new()
        .route("/", get(devices::list_devices).post(devices::create_device))
        .route("/search", get(devices::search_devices))
        .route("/verify/:barcode", get(devices::verify_barcode))
        .route(
            "/:id",
            get(devices::get_device).delete(devices::deactivate_device),
        );

    let jobs_routes = Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/:id",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/:id/devices", post(jobs::add_device))
        .route("/:id/devices/bulk", post(jobs::bulk_add_devices))
        .route("/:id/devices/:device_id", delete(jobs::remove_device));

    let scans_routes = Router::new().route("/", post(scans::record_scan));

    let reports_routes = Router::new()
        .route("/summary", get(reports::summary))
        .route("/devices", get(reports::device_usage))
        .route("/jobs", get(reports::job_report))
        .route("/daily", get(reports::daily_report));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/devices", devices_routes)
        .nest("/api/jobs", jobs_routes)
        .nest("/api/scans", scans_routes)
        .nest("/api/reports", reports_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
