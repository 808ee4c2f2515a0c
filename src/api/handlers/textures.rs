//! Ad-hoc texture rendering
//!
//! Renders a texture from an explicit request instead of the session state.
//! Nothing is stored or bound.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::api::handlers::zones::{ApiError, ErrorResponse};
use crate::domain::{HexColor, ImageTransform, TransformPatch};
use crate::engine::{LayerSource, TextOptions, TextureError};
use crate::scene::TextureMap;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewLayer {
    pub url: String,
    /// Missing fields keep the default (centered, unrotated, scale 1)
    #[serde(default)]
    pub transform: TransformPatch,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    /// `#RGB` or `#RRGGBB`
    pub background: String,
    #[serde(default)]
    pub layers: Vec<PreviewLayer>,
    pub text: Option<TextOptions>,
    /// Defaults to the device profile's output scale
    pub output_scale: Option<f64>,
}

fn bad_request(code: &str, message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message,
        },
    })
}

/// POST /api/v1/textures/preview - Render a texture without binding it
#[utoipa::path(
    post,
    path = "/api/v1/textures/preview",
    tag = "materials",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "PNG texture", content_type = "image/png"),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 422, description = "Texture could not be rendered", body = ErrorResponse)
    )
)]
pub async fn preview_texture(state: web::Data<AppState>, body: web::Json<PreviewRequest>) -> HttpResponse {
    let request = body.into_inner();

    let background = match HexColor::parse(&request.background) {
        Ok(color) => color,
        Err(e) => return bad_request("INVALID_COLOR", e.to_string()),
    };

    let limits = state.session.store().limits();
    let layers: Vec<LayerSource> = request
        .layers
        .into_iter()
        .map(|layer| {
            let mut transform = ImageTransform::default();
            transform.apply(&layer.transform, &limits);
            LayerSource { url: layer.url, transform }
        })
        .collect();

    let binder = state.session.binder();
    let output_scale = request.output_scale.unwrap_or_else(|| binder.output_scale());
    let compositor = binder.compositor();

    info!(
        layers = layers.len(),
        output_scale,
        fit = ?compositor.fit_policy(),
        "Rendering texture preview"
    );

    let texture = match compositor
        .composite(background, &layers, request.text.as_ref(), output_scale)
        .await
    {
        Ok(texture) => texture,
        Err(e @ TextureError::InvalidOutputScale(_)) => return bad_request("INVALID_OUTPUT_SCALE", e.to_string()),
        Err(e @ (TextureError::InvalidTextSize(_) | TextureError::TextTooLarge { .. })) => {
            return bad_request("INVALID_TEXT", e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Texture preview failed");
            return HttpResponse::UnprocessableEntity().json(ErrorResponse {
                success: false,
                error: ApiError {
                    code: "RENDER_FAILED".to_string(),
                    message: e.to_string(),
                },
            });
        }
    };

    let size = format!("{}x{}", texture.width(), texture.height());
    let map = TextureMap::clamped(texture);
    match web::block(move || map.encode_png()).await {
        Ok(Ok(png)) => HttpResponse::Ok()
            .content_type("image/png")
            .insert_header(("X-Texture-Size", size))
            .body(png),
        Ok(Err(e)) => {
            error!(error = %e, "PNG encoding failed");
            HttpResponse::InternalServerError().finish()
        }
        Err(e) => {
            error!(error = %e, "PNG encoding task failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}
