use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    GenerateAccessCodeReq, GenerateAccessCodeRes, HealthRes, HealthService,
    ValidateAccessCodeReq, ValidateAccessCodeRes,
};
use daypass_core::{AccessCodeService, HospitalLocation};

/// Application state shared across REST API handlers
///
/// Holds the access-code service, which owns the bundled timezone dataset.
/// The dataset decompresses once at startup and is shared by every request.
#[derive(Clone)]
struct AppState {
    access_codes: Arc<AccessCodeService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, generate_access_code, validate_access_code),
    components(schemas(
        HealthRes,
        GenerateAccessCodeReq,
        GenerateAccessCodeRes,
        ValidateAccessCodeReq,
        ValidateAccessCodeRes
    ))
)]
struct ApiDoc;

/// Main entry point for the DayPass access-code service
///
/// Starts the REST server that hospital dashboards and check-in clients
/// call to derive and validate daily access codes. Codes are pure
/// derivations, so the service holds no database and no session state.
///
/// # Environment Variables
/// - `DAYPASS_ADDR`: REST server address (default: "0.0.0.0:3000")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("daypass_run=info".parse()?)
                .add_directive("daypass_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DAYPASS_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting DayPass REST on {}", addr);

    let access_codes = Arc::new(AccessCodeService::new());

    let app = Router::new()
        .route("/health", get(health))
        .route("/access-codes", post(generate_access_code))
        .route("/access-codes/validate", post(validate_access_code))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(AppState { access_codes });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Returns the current health status of the DayPass service.
/// This endpoint is used for monitoring and load balancer health checks.
///
/// # Returns
/// * `Json<HealthRes>` - Health status response containing service status
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/access-codes",
    request_body = GenerateAccessCodeReq,
    responses(
        (status = 200, description = "The hospital's current access code", body = GenerateAccessCodeRes),
        (status = 400, description = "Bad request")
    )
)]
/// Derive a hospital's current access code
///
/// Returns the 4-digit code for the hospital's current local day together
/// with the rotation date it was derived for. Hospital dashboards call this
/// to display the code staff hand to parents at check-in.
///
/// # Parameters
/// * `req` - The hospital's identifier and optional coordinates
///
/// # Returns
/// * `Ok(Json<GenerateAccessCodeRes>)` - The current code and its rotation date
/// * `Err((StatusCode, &str))` - Bad request if the hospital id is blank
async fn generate_access_code(
    State(state): State<AppState>,
    Json(req): Json<GenerateAccessCodeReq>,
) -> Result<Json<GenerateAccessCodeRes>, (StatusCode, &'static str)> {
    if req.hospital_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "hospital_id is required"));
    }

    let hospital = HospitalLocation::new(req.hospital_id, req.latitude, req.longitude);

    // One instant for both, so the reported date always matches the code
    // even across a midnight rollover.
    let now = chrono::Utc::now();
    let local_date = state.access_codes.local_date_at(
        hospital.latitude.as_deref(),
        hospital.longitude.as_deref(),
        now,
    );
    let code = state.access_codes.generate_code_at(&hospital, now);

    Ok(Json(GenerateAccessCodeRes {
        code: code.to_string(),
        local_date,
    }))
}

#[utoipa::path(
    post,
    path = "/access-codes/validate",
    request_body = ValidateAccessCodeReq,
    responses(
        (status = 200, description = "Whether the submitted code is current", body = ValidateAccessCodeRes),
        (status = 400, description = "Bad request")
    )
)]
/// Check a submitted code against a hospital's current code
///
/// Recomputes the hospital's code for its current local day and compares
/// by exact string equality. A stale, malformed, or foreign code yields
/// `valid: false` rather than an error.
///
/// # Parameters
/// * `req` - The submitted code plus the hospital's identifier and coordinates
///
/// # Returns
/// * `Ok(Json<ValidateAccessCodeRes>)` - Whether the code is current
/// * `Err((StatusCode, &str))` - Bad request if the hospital id is blank
async fn validate_access_code(
    State(state): State<AppState>,
    Json(req): Json<ValidateAccessCodeReq>,
) -> Result<Json<ValidateAccessCodeRes>, (StatusCode, &'static str)> {
    if req.hospital_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "hospital_id is required"));
    }

    let ValidateAccessCodeReq {
        code,
        hospital_id,
        latitude,
        longitude,
    } = req;
    let hospital = HospitalLocation::new(hospital_id, latitude, longitude);
    let valid = state.access_codes.validate_code(&code, &hospital);

    Ok(Json(ValidateAccessCodeRes { valid }))
}
