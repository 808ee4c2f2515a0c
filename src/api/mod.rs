//! API module - HTTP routes and handlers

pub mod handlers;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Largest request body accepted; per-device limits are enforced by the session
pub const MAX_UPLOAD_BODY: usize = 16 * 1024 * 1024;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/customization", web::get().to(handlers::zones::get_customization))
            .route("/textures/preview", web::post().to(handlers::textures::preview_texture))
            .service(
                web::scope("/zones/{zone}")
                    .route("/color", web::put().to(handlers::zones::set_zone_color))
                    .route("/material", web::get().to(handlers::zones::get_material))
                    .route("/texture", web::get().to(handlers::zones::get_texture))
                    .service(
                        web::resource("/images")
                            .app_data(web::PayloadConfig::new(MAX_UPLOAD_BODY))
                            .route(web::post().to(handlers::zones::upload_image))
                    )
                    .route("/images/{id}", web::patch().to(handlers::zones::update_image_transform))
                    .route("/images/{id}", web::delete().to(handlers::zones::remove_image))
            )
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::MaterialBinder;
    use crate::config::{DeviceClass, DeviceProfile, FitPolicy};
    use crate::domain::Zone;
    use crate::engine::{FontBook, MemoryFetcher, TextureCompositor};
    use crate::scene::MaterialScene;
    use crate::session::CustomizerSession;
    use crate::upload::{ImageHost, UploadFile};
    use crate::AppState;
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Instant;

    struct NoHost;

    #[async_trait]
    impl ImageHost for NoHost {
        async fn upload(&self, _file: &UploadFile) -> Option<String> {
            None
        }
    }

    fn app_state() -> web::Data<AppState> {
        let compositor = Arc::new(TextureCompositor::new(
            Arc::new(MemoryFetcher::default()),
            FontBook::new(),
            FitPolicy::Natural,
        ));
        let profile = DeviceProfile::for_class(DeviceClass::Constrained);
        let scene = MaterialScene::with_zones(&Zone::ALL).into_shared();
        let binder = Arc::new(MaterialBinder::new(compositor, scene, profile.texture_output_scale));

        web::Data::new(AppState {
            session: Arc::new(CustomizerSession::new(binder, Arc::new(NoHost), profile)),
            fonts_loaded: 0,
            started_at: Instant::now(),
        })
    }

    #[actix_web::test]
    async fn test_set_color_and_read_back() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let req = test::TestRequest::put()
            .uri("/api/v1/zones/strap/color")
            .set_json(serde_json::json!({ "color": "#f00" }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["color"], "#FF0000");
        assert_eq!(resp["version"], 1);

        let req = test::TestRequest::get().uri("/api/v1/customization").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["zones"].as_array().unwrap().len(), 9);
        assert_eq!(resp["max_upload_bytes"], 2 * 1024 * 1024);
    }

    #[actix_web::test]
    async fn test_rejects_bad_zone_and_color() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let req = test::TestRequest::put()
            .uri("/api/v1/zones/thumbnail/color")
            .set_json(serde_json::json!({ "color": "#fff" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::put()
            .uri("/api/v1/zones/strap/color")
            .set_json(serde_json::json!({ "color": "red" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_upload_validation_message() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/zones/outer-palm/images")
            .insert_header(("Content-Type", "image/jpeg"))
            .set_payload(vec![0u8; 3 * 1024 * 1024])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Image exceeds 2MB limit");
    }

    #[actix_web::test]
    async fn test_missing_image_is_not_found() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/zones/strap/images/{}", uuid::Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_preview_rejects_oversized_requests() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/textures/preview")
            .set_json(serde_json::json!({ "background": "#000", "output_scale": 1e9 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_OUTPUT_SCALE");

        let req = test::TestRequest::post()
            .uri("/api/v1/textures/preview")
            .set_json(serde_json::json!({
                "background": "#000",
                "text": { "text": "HUGE", "size": 100000.0 }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_TEXT");
    }

    #[actix_web::test]
    async fn test_preview_renders_png() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/textures/preview")
            .set_json(serde_json::json!({ "background": "#00FF00", "output_scale": 0.25 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Texture-Size").unwrap().to_str().unwrap(), "128x128");

        let png = test::read_body(resp).await;
        assert_eq!(&png[1..4], b"PNG");
    }
}
