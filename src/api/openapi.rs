//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    health::HealthResponse,
    textures::{PreviewLayer, PreviewRequest},
    zones::{
        ApiError, CustomizationResponse, ErrorResponse, MaterialView, SetColorRequest, ZoneView,
    },
};
use crate::domain::{ImageLayer, ImageTransform, TransformPatch, Zone};
use crate::engine::TextOptions;
use crate::upload::{StatusKind, UploadStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Glove Customizer API",
        version = "1.0.0",
        description = "Per-zone colors, uploaded image layers and composited glove textures",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "customization", description = "Zone colors and state"),
        (name = "images", description = "Image layer upload and transforms"),
        (name = "materials", description = "Bound materials and textures")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::zones::get_customization,
        crate::api::handlers::zones::set_zone_color,
        crate::api::handlers::zones::upload_image,
        crate::api::handlers::zones::update_image_transform,
        crate::api::handlers::zones::remove_image,
        crate::api::handlers::zones::get_material,
        crate::api::handlers::zones::get_texture,
        crate::api::handlers::textures::preview_texture,
    ),
    components(
        schemas(
            HealthResponse,
            CustomizationResponse,
            ZoneView,
            SetColorRequest,
            MaterialView,
            ErrorResponse,
            ApiError,
            UploadStatus,
            StatusKind,
            Zone,
            ImageLayer,
            ImageTransform,
            TransformPatch,
            PreviewRequest,
            PreviewLayer,
            TextOptions,
        )
    )
)]
pub struct ApiDoc;
