//! Zone customization endpoints

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{HexColor, ImageLayer, TransformPatch, Zone};
use crate::scene::SceneAsset;
use crate::state::{CustomizationState, StateError};
use crate::upload::{StatusKind, UploadFile, UploadStatus};
use crate::AppState;

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

fn error_response(
    mut builder: actix_web::HttpResponseBuilder,
    code: &str,
    message: impl Into<String>,
) -> HttpResponse {
    builder.json(ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message: message.into(),
        },
    })
}

fn parse_zone(raw: &str) -> Result<Zone, HttpResponse> {
    raw.parse::<Zone>()
        .map_err(|e| error_response(HttpResponse::NotFound(), "ZONE_NOT_FOUND", e.to_string()))
}

fn state_error(e: StateError) -> HttpResponse {
    match e {
        StateError::ZoneRejectsImages(_) => {
            error_response(HttpResponse::BadRequest(), "ZONE_REJECTS_IMAGES", e.to_string())
        }
        StateError::ImageNotFound { .. } => {
            error_response(HttpResponse::NotFound(), "IMAGE_NOT_FOUND", e.to_string())
        }
    }
}

/// One zone as seen by the UI
#[derive(Serialize, ToSchema)]
pub struct ZoneView {
    pub zone: Zone,
    pub mesh_name: String,
    /// `#RRGGBB`
    pub color: String,
    pub accepts_images: bool,
    pub version: u64,
    pub images: Vec<ImageLayer>,
}

#[derive(Serialize, ToSchema)]
pub struct CustomizationResponse {
    pub zones: Vec<ZoneView>,
    pub max_image_scale: f64,
    pub max_upload_bytes: u64,
    pub last_upload: Option<UploadStatus>,
}

fn zone_view(state: &CustomizationState, zone: Zone) -> ZoneView {
    ZoneView {
        zone,
        mesh_name: zone.mesh_name().to_string(),
        color: state.color(zone).to_string(),
        accepts_images: zone.accepts_images(),
        version: state.version(zone),
        images: state.images(zone).to_vec(),
    }
}

/// GET /api/v1/customization - Current customization state
#[utoipa::path(
    get,
    path = "/api/v1/customization",
    tag = "customization",
    responses(
        (status = 200, description = "Current state of every zone", body = CustomizationResponse)
    )
)]
pub async fn get_customization(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.session.store().snapshot();
    let profile = state.session.profile();

    HttpResponse::Ok().json(CustomizationResponse {
        zones: Zone::ALL.iter().map(|z| zone_view(&snapshot, *z)).collect(),
        max_image_scale: profile.max_image_scale,
        max_upload_bytes: profile.max_upload_bytes,
        last_upload: state.session.status(),
    })
}

/// Request body for a color change
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetColorRequest {
    /// `#RGB` or `#RRGGBB`
    pub color: String,
}

/// PUT /api/v1/zones/{zone}/color - Set a zone's flat color
#[utoipa::path(
    put,
    path = "/api/v1/zones/{zone}/color",
    tag = "customization",
    params(("zone" = String, Path, description = "Zone slug or mesh name")),
    request_body = SetColorRequest,
    responses(
        (status = 200, description = "Color updated", body = ZoneView),
        (status = 400, description = "Invalid color", body = ErrorResponse),
        (status = 404, description = "Unknown zone", body = ErrorResponse)
    )
)]
pub async fn set_zone_color(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SetColorRequest>,
) -> HttpResponse {
    let zone = match parse_zone(&path) {
        Ok(zone) => zone,
        Err(response) => return response,
    };

    let color = match HexColor::parse(&body.color) {
        Ok(color) => color,
        Err(e) => return error_response(HttpResponse::BadRequest(), "INVALID_COLOR", e.to_string()),
    };

    let store = state.session.store();
    store.set_zone_color(zone, color);
    HttpResponse::Ok().json(zone_view(&store.snapshot(), zone))
}

/// POST /api/v1/zones/{zone}/images - Upload an image into a zone
///
/// The request body is the raw image; `Content-Type` must be an image type.
#[utoipa::path(
    post,
    path = "/api/v1/zones/{zone}/images",
    tag = "images",
    params(
        ("zone" = String, Path, description = "Zone slug or mesh name"),
        ("X-File-Name" = Option<String>, Header, description = "Original file name")
    ),
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 201, description = "Image uploaded and attached", body = UploadStatus),
        (status = 400, description = "Rejected before upload", body = UploadStatus),
        (status = 502, description = "Image host failure", body = UploadStatus)
    )
)]
pub async fn upload_image(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let zone = match parse_zone(&path) {
        Ok(zone) => zone,
        Err(response) => return response,
    };

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let name = req
        .headers()
        .get("X-File-Name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("upload")
        .to_string();

    info!(zone = %zone, file = %name, bytes = body.len(), "Processing image upload");

    let file = UploadFile::new(name, content_type, body);
    let status = state.session.process_file(zone, file).await;

    let kind = status.kind;
    match kind {
        StatusKind::Success => HttpResponse::Created().json(status),
        StatusKind::Error if status == UploadStatus::failed() => {
            error!(zone = %zone, "Image host rejected the upload");
            HttpResponse::BadGateway().json(status)
        }
        _ => {
            warn!(zone = %zone, message = %status.message, "Upload rejected");
            HttpResponse::BadRequest().json(status)
        }
    }
}

/// PATCH /api/v1/zones/{zone}/images/{id} - Edit an image transform
#[utoipa::path(
    patch,
    path = "/api/v1/zones/{zone}/images/{id}",
    tag = "images",
    params(
        ("zone" = String, Path, description = "Zone slug or mesh name"),
        ("id" = Uuid, Path, description = "Image layer id")
    ),
    request_body = TransformPatch,
    responses(
        (status = 200, description = "Transform updated (values clamped)", body = ImageLayer),
        (status = 404, description = "Unknown zone or image", body = ErrorResponse)
    )
)]
pub async fn update_image_transform(
    state: web::Data<AppState>,
    path: web::Path<(String, Uuid)>,
    body: web::Json<TransformPatch>,
) -> HttpResponse {
    let (raw_zone, id) = path.into_inner();
    let zone = match parse_zone(&raw_zone) {
        Ok(zone) => zone,
        Err(response) => return response,
    };

    match state.session.store().update_image_transform(zone, id, &body) {
        Ok(layer) => HttpResponse::Ok().json(layer),
        Err(e) => state_error(e),
    }
}

/// DELETE /api/v1/zones/{zone}/images/{id} - Remove an image
#[utoipa::path(
    delete,
    path = "/api/v1/zones/{zone}/images/{id}",
    tag = "images",
    params(
        ("zone" = String, Path, description = "Zone slug or mesh name"),
        ("id" = Uuid, Path, description = "Image layer id")
    ),
    responses(
        (status = 204, description = "Image removed"),
        (status = 404, description = "Unknown zone or image", body = ErrorResponse)
    )
)]
pub async fn remove_image(state: web::Data<AppState>, path: web::Path<(String, Uuid)>) -> HttpResponse {
    let (raw_zone, id) = path.into_inner();
    let zone = match parse_zone(&raw_zone) {
        Ok(zone) => zone,
        Err(response) => return response,
    };

    match state.session.store().remove_image(zone, id) {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(e) => state_error(e),
    }
}

/// Material currently bound to a zone's mesh
#[derive(Serialize, ToSchema)]
pub struct MaterialView {
    pub zone: Zone,
    pub color: String,
    pub has_map: bool,
    pub map_size: Option<u32>,
    pub applied_version: u64,
}

/// GET /api/v1/zones/{zone}/material - Bound material state
#[utoipa::path(
    get,
    path = "/api/v1/zones/{zone}/material",
    tag = "materials",
    params(("zone" = String, Path, description = "Zone slug or mesh name")),
    responses(
        (status = 200, description = "Bound material", body = MaterialView),
        (status = 404, description = "Zone unknown or absent from the asset", body = ErrorResponse)
    )
)]
pub async fn get_material(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let zone = match parse_zone(&path) {
        Ok(zone) => zone,
        Err(response) => return response,
    };

    let scene = state.session.binder().scene().read();
    match scene.surface(zone.mesh_name()) {
        Some(slot) => HttpResponse::Ok().json(MaterialView {
            zone,
            color: slot.color.to_string(),
            has_map: slot.map.is_some(),
            map_size: slot.map.as_ref().map(|m| m.image.width()),
            applied_version: slot.applied_version,
        }),
        None => error_response(
            HttpResponse::NotFound(),
            "SURFACE_NOT_FOUND",
            format!("Asset has no mesh named '{}'", zone.mesh_name()),
        ),
    }
}

/// GET /api/v1/zones/{zone}/texture - Bound texture as PNG
#[utoipa::path(
    get,
    path = "/api/v1/zones/{zone}/texture",
    tag = "materials",
    params(("zone" = String, Path, description = "Zone slug or mesh name")),
    responses(
        (status = 200, description = "PNG texture", content_type = "image/png"),
        (status = 404, description = "No texture bound", body = ErrorResponse)
    )
)]
pub async fn get_texture(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let zone = match parse_zone(&path) {
        Ok(zone) => zone,
        Err(response) => return response,
    };

    // Clone the Arc out so encoding happens without the scene lock
    let map = state
        .session
        .binder()
        .scene()
        .read()
        .surface(zone.mesh_name())
        .and_then(|slot| slot.map.clone());

    let Some(map) = map else {
        return error_response(HttpResponse::NotFound(), "NO_TEXTURE", format!("{} has no texture bound", zone));
    };

    match web::block(move || map.encode_png()).await {
        Ok(Ok(png)) => HttpResponse::Ok().content_type("image/png").body(png),
        Ok(Err(e)) => {
            error!(zone = %zone, error = %e, "PNG encoding failed");
            error_response(HttpResponse::InternalServerError(), "ENCODE_FAILED", e.to_string())
        }
        Err(e) => error_response(HttpResponse::InternalServerError(), "ENCODE_FAILED", e.to_string()),
    }
}
