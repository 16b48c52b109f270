//! REST API for the pallet loading service.
//!
//! Provides HTTP endpoints for packing manifests onto pallets.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, EngineSettings};
use crate::manifest::{Expansion, InstanceOverride, ManifestLine, expand};
use crate::model::{
    BoxSpec, FlatRotation, GroupPriority, OrientationKind, PalletKind, PalletType, ValidationError,
};
use crate::packing_config::PackingConfig;
use crate::rules::{RoleRule, RoleRuleTable};
use crate::scheduler::{
    PackingResult, PalletSummary, ShipmentSummary, schedule, schedule_with_progress,
};

#[derive(Clone)]
struct ApiState {
    engine: EngineSettings,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes match https://unpkg.com/swagger-ui-dist@5.17.14/.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>auto-pallet API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the packing endpoints.
///
/// `boxes` lists the manifest lines; `rules` layers request-specific role
/// rules over the configured table.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "pallet_type": "AU_CHEP",
        "boxes": [
            {
                "product_id": "wr-s4", "role_index": 0,
                "width": 730.0, "depth": 600.0, "height": 500.0, "weight": 30.0,
                "quantity": 2
            },
            {
                "product_id": "wr-s4", "role_index": 1,
                "width": 400.0, "depth": 300.0, "height": 200.0, "weight": 8.0,
                "fragile_rating": 9, "fragile_weight_limit": 15.0,
                "allow_edge": true
            }
        ],
        "rules": [
            { "product_id": "wr-s4", "role_index": 0, "group_priority": "base" }
        ]
    })
)]
pub struct PackRequest {
    #[serde(default)]
    #[schema(nullable = true)]
    pub pallet_type: Option<PalletKind>,
    pub boxes: Vec<ManifestLine>,
    #[serde(default)]
    pub rules: Vec<RoleRule>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_overhang: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_stack_height: Option<f64>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    pallet: PalletType,
    expansion: Expansion,
    config: PackingConfig,
}

impl ValidatedPackRequest {
    fn unit_count(&self) -> usize {
        self.expansion.len()
    }
}

#[derive(Debug, Error)]
enum PackRequestValidationError {
    #[error("box line {line}: {source}")]
    InvalidBox {
        line: usize,
        source: ValidationError,
    },
    #[error("role rule: {0}")]
    InvalidRule(ValidationError),
    #[error("{0}")]
    InvalidOverride(ValidationError),
}

impl PackRequest {
    fn into_validated(
        self,
        engine: &EngineSettings,
    ) -> Result<ValidatedPackRequest, PackRequestValidationError> {
        let pallet = self
            .pallet_type
            .unwrap_or_else(|| engine.default_pallet())
            .pallet_type();

        let mut config = engine.packing_config();
        if let Some(overhang) = self.max_overhang {
            if overhang < 0.0 || !overhang.is_finite() {
                return Err(PackRequestValidationError::InvalidOverride(
                    ValidationError::InvalidConfiguration(format!(
                        "max_overhang must be a non-negative number, got: {}",
                        overhang
                    )),
                ));
            }
            config.max_overhang = overhang;
        }
        if let Some(height) = self.max_stack_height {
            if height <= pallet.deck_height || !height.is_finite() {
                return Err(PackRequestValidationError::InvalidOverride(
                    ValidationError::InvalidConfiguration(format!(
                        "max_stack_height must exceed the deck height of {} mm, got: {}",
                        pallet.deck_height, height
                    )),
                ));
            }
            config.max_stack_height = height;
        }

        let request_rules =
            RoleRuleTable::from_rules(self.rules).map_err(PackRequestValidationError::InvalidRule)?;
        let rules = engine.role_rules().merged(&request_rules);

        let expansion = expand(&self.boxes, &rules, config.max_units)
            .map_err(|(line, source)| PackRequestValidationError::InvalidBox { line, source })?;

        Ok(ValidatedPackRequest {
            pallet,
            expansion,
            config,
        })
    }
}

/// Response structure with all loaded pallets.
///
/// # Fields
/// * `pallets` - Loaded pallets in loading order
/// * `unplaced` - Boxes that ended up on no pallet
/// * `truncated` - A safety limit stopped the run early
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub pallets: Vec<PackedPallet>,
    pub unplaced: Vec<PackedUnplacedUnit>,
    pub is_complete: bool,
    pub truncated: bool,
    pub summary: ShipmentSummary,
}

/// Single pallet with metrics and layers.
#[derive(Serialize, ToSchema)]
pub struct PackedPallet {
    /// Pallet number (1-based)
    pub id: usize,
    pub pallet_type: PalletKind,
    pub pallet_name: String,
    /// Deck width, depth and height
    #[schema(value_type = [f64; 3], example = json!([1165.0, 1165.0, 150.0]))]
    pub pallet_dims: (f64, f64, f64),
    pub tare_weight: f64,
    pub total_height: f64,
    pub total_weight: f64,
    pub load_width: f64,
    pub load_depth: f64,
    pub efficiency: f64,
    #[schema(value_type = Option<Vec<f64>>, example = json!([0.0, 0.0]))]
    pub center_of_gravity: Option<(f64, f64)>,
    pub cog_offset: Option<f64>,
    pub cog_over_ground_layer: bool,
    pub max_crush_risk: f64,
    pub layers: Vec<PackedLayer>,
}

/// One layer of a pallet.
#[derive(Serialize, ToSchema)]
pub struct PackedLayer {
    /// Layer number from the bottom (1-based)
    pub index: usize,
    pub product_id: String,
    pub role_index: u32,
    pub base_y: f64,
    pub height: f64,
    pub units: Vec<PackedUnit>,
}

/// Single placed box in the response.
///
/// # Fields
/// * `id` - Unit ID (expansion index)
/// * `line` / `instance` - Origin in the request manifest
/// * `pos` - Minimum corner (x, y, z) in the pallet frame
/// * `dims` - Oriented extents (x, y, z)
#[derive(Serialize, ToSchema)]
pub struct PackedUnit {
    pub id: u64,
    pub line: Option<usize>,
    pub instance: Option<u32>,
    pub product_id: String,
    pub role_index: u32,
    pub orientation: OrientationKind,
    #[schema(value_type = [f64; 3], example = json!([-200.0, 150.0, -150.0]))]
    pub pos: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([400.0, 200.0, 300.0]))]
    pub dims: (f64, f64, f64),
    pub weight: f64,
    pub crush_risk: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct PackedUnplacedUnit {
    pub id: u64,
    pub line: Option<usize>,
    pub instance: Option<u32>,
    pub product_id: String,
    pub role_index: u32,
    pub weight: f64,
    /// Unrotated width, depth and height
    #[schema(value_type = [f64; 3], example = json!([2000.0, 1800.0, 300.0]))]
    pub dims: (f64, f64, f64),
    pub reason_code: String,
    pub reason: String,
}

/// Catalog entry returned by `GET /pallet_types`.
#[derive(Serialize, ToSchema)]
pub struct PalletTypeInfo {
    pub key: PalletKind,
    pub name: String,
    pub width: f64,
    pub depth: f64,
    pub deck_height: f64,
    pub tare_weight: f64,
    pub is_default: bool,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn rule_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid role rule configuration",
        details,
    )
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    engine: &EngineSettings,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated(engine) {
        Ok(validated) => Ok(validated),
        Err(err @ PackRequestValidationError::InvalidRule(_)) => {
            Err(rule_config_error(err.to_string()))
        }
        Err(err) => Err(validation_error(err.to_string())),
    }
}

impl PackResponse {
    /// Creates a PackResponse from a PackingResult, mapping units back to the manifest.
    pub fn from_packing_result(result: PackingResult, expansion: &Expansion) -> Self {
        let summary = result.summary();
        let is_complete = result.is_complete();
        let PackingResult {
            pallets,
            unplaced,
            truncated,
        } = result;

        Self {
            pallets: pallets
                .into_iter()
                .enumerate()
                .map(|(i, load)| {
                    let metrics = &load.metrics;
                    let layers = load
                        .layers
                        .iter()
                        .enumerate()
                        .map(|(layer_idx, layer)| PackedLayer {
                            index: layer_idx + 1,
                            product_id: layer.group.product_id.clone(),
                            role_index: layer.group.role_index,
                            base_y: layer.base_y,
                            height: layer.height,
                            units: layer
                                .units
                                .iter()
                                .map(|placed| {
                                    let origin = expansion.origin(placed.id());
                                    PackedUnit {
                                        id: placed.id().0,
                                        line: origin.map(|o| o.line),
                                        instance: origin.map(|o| o.instance),
                                        product_id: placed.unit.spec.product_id.clone(),
                                        role_index: placed.unit.spec.role_index,
                                        orientation: placed.orientation,
                                        pos: placed.position.as_tuple(),
                                        dims: placed.extents.as_tuple(),
                                        weight: placed.unit.spec.weight,
                                        crush_risk: metrics
                                            .crush_risk_of(placed.id())
                                            .map(|risk| risk.ratio),
                                    }
                                })
                                .collect(),
                        })
                        .collect();

                    PackedPallet {
                        id: i + 1,
                        pallet_type: load.pallet.kind,
                        pallet_name: load.pallet.name.to_string(),
                        pallet_dims: (load.pallet.width, load.pallet.depth, load.pallet.deck_height),
                        tare_weight: load.pallet.tare_weight,
                        total_height: metrics.total_height,
                        total_weight: metrics.total_weight,
                        load_width: metrics.load_width,
                        load_depth: metrics.load_depth,
                        efficiency: metrics.efficiency,
                        center_of_gravity: metrics.center_of_gravity.map(|cog| (cog.x, cog.z)),
                        cog_offset: metrics.center_of_gravity.map(|cog| cog.offset),
                        cog_over_ground_layer: metrics
                            .center_of_gravity
                            .map(|cog| cog.over_ground_layer)
                            .unwrap_or(false),
                        max_crush_risk: metrics.max_crush_risk,
                        layers,
                    }
                })
                .collect(),
            unplaced: unplaced
                .into_iter()
                .map(|entry| {
                    let origin = expansion.origin(entry.unit.id);
                    let spec = &entry.unit.spec;
                    PackedUnplacedUnit {
                        id: entry.unit.id.0,
                        line: origin.map(|o| o.line),
                        instance: origin.map(|o| o.instance),
                        product_id: spec.product_id.clone(),
                        role_index: spec.role_index,
                        weight: spec.weight,
                        dims: (spec.width, spec.depth, spec.height),
                        reason_code: entry.reason.code().to_string(),
                        reason: entry.reason.to_string(),
                    }
                })
                .collect(),
            is_complete,
            truncated,
            summary,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream, handle_pallet_types),
    components(
        schemas(
            PackRequest,
            PackResponse,
            PackedPallet,
            PackedLayer,
            PackedUnit,
            PackedUnplacedUnit,
            PalletTypeInfo,
            ErrorResponse,
            ManifestLine,
            InstanceOverride,
            BoxSpec,
            RoleRule,
            GroupPriority,
            FlatRotation,
            OrientationKind,
            PalletKind,
            ShipmentSummary,
            PalletSummary
        )
    ),
    tags((name = "packing", description = "Endpoints for pallet loading"))
)]
struct ApiDoc;

fn router(engine: EngineSettings) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/pallet_types", get(handle_pallet_types))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { engine })
}

/// Starts the API server.
///
/// Configures CORS for cross-origin requests.
/// Runs until the server is terminated.
pub async fn start_api_server(config: ApiConfig, engine: EngineSettings) -> std::io::Result<()> {
    let app = router(engine);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("API endpoints: POST /pack, POST /pack_stream, GET /pallet_types");
    info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /pack endpoint.
///
/// Expands the manifest and loads it onto as many pallets as needed.
///
/// # Parameters
/// * `payload` - JSON payload with pallet type and box lines
///
/// # Returns
/// JSON response with all loaded pallets and unplaced boxes
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Boxes loaded onto pallets", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or role rule configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_pack_request(payload, &state.engine) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        units = request.unit_count(),
        pallet = %request.pallet.kind,
        "new pack request"
    );
    let ValidatedPackRequest {
        pallet,
        expansion,
        config,
    } = request;

    let result = schedule(expansion.units.clone(), &pallet, &config);
    info!(
        pallets = result.pallets.len(),
        unplaced = result.unplaced.len(),
        truncated = result.truncated,
        "pack request finished"
    );

    let response = PackResponse::from_packing_result(result, &expansion);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /pack_stream endpoint (SSE).
///
/// Streams progress events as Server-Sent Events (text/event-stream),
/// followed by a final `result` message carrying the full response.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or role rule configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let ValidatedPackRequest {
        pallet,
        expansion,
        config,
    } = match parse_pack_request(payload, &state.engine) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let result = schedule_with_progress(expansion.units.clone(), &pallet, &config, |evt| {
            if let Ok(json) = serde_json::to_string(&evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(json);
            }
        });

        let response = PackResponse::from_packing_result(result, &expansion);
        match serde_json::to_string(&json!({ "type": "result", "response": response })) {
            Ok(json) => {
                let _ = tx.blocking_send(json);
            }
            Err(err) => warn!(%err, "could not serialize the final pack response"),
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /pallet_types endpoint.
///
/// Lists the pallet catalog and marks the configured default.
#[utoipa::path(
    get,
    path = "/pallet_types",
    responses(
        (status = 200, description = "Pallet catalog", body = [PalletTypeInfo])
    ),
    tag = "packing"
)]
async fn handle_pallet_types(State(state): State<ApiState>) -> impl IntoResponse {
    Json(pallet_catalog(state.engine.default_pallet()))
}

fn pallet_catalog(default: PalletKind) -> Vec<PalletTypeInfo> {
    PalletKind::ALL
        .into_iter()
        .map(|kind| {
            let pallet = kind.pallet_type();
            PalletTypeInfo {
                key: kind,
                name: pallet.name.to_string(),
                width: pallet.width,
                depth: pallet.depth,
                deck_height: pallet.deck_height,
                tare_weight: pallet.tare_weight,
                is_default: kind == default,
            }
        })
        .collect()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
