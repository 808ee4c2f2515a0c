//! Material binder
//!
//! Applies a customization snapshot onto the live scene: every zone surface
//! gets its flat color, image-bearing zones get a freshly composited color map.
//! Zones regenerate concurrently and fail independently. A texture is only
//! assigned if no newer state version for its zone has started applying.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{HexColor, Zone};
use crate::engine::{LayerSource, TextureCompositor, TextureError};
use crate::scene::{SceneAsset, SharedScene, TextureMap};
use crate::state::{CustomizationState, CustomizationStore, SubscriptionId};

/// Outcome of one `apply_customization` pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BindReport {
    /// Zones whose flat color was set
    pub colored: Vec<Zone>,
    /// Zones that received a new texture
    pub textured: Vec<Zone>,
    /// Zones whose previous map was cleared
    pub cleared: Vec<Zone>,
    /// Zones the asset does not expose
    pub missing: Vec<Zone>,
    /// Zones skipped or discarded because a newer version got there first
    pub stale: Vec<Zone>,
    /// Zones whose texture generation failed
    pub failed: Vec<(Zone, String)>,
}

impl BindReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Zone texture job collected during the synchronous pass
struct TextureJob {
    zone: Zone,
    version: u64,
    background: HexColor,
    layers: Vec<LayerSource>,
}

/// Binds customization state onto scene materials
pub struct MaterialBinder {
    compositor: Arc<TextureCompositor>,
    scene: SharedScene,
    output_scale: f64,
}

impl MaterialBinder {
    pub fn new(compositor: Arc<TextureCompositor>, scene: SharedScene, output_scale: f64) -> Self {
        MaterialBinder {
            compositor,
            scene,
            output_scale,
        }
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    pub fn compositor(&self) -> &Arc<TextureCompositor> {
        &self.compositor
    }

    pub fn output_scale(&self) -> f64 {
        self.output_scale
    }

    /// Re-derive every zone material from `state`.
    ///
    /// Idempotent: applying the same snapshot twice leaves the same material state.
    #[instrument(skip_all)]
    pub async fn apply_customization(&self, state: &CustomizationState) -> BindReport {
        let mut report = BindReport::default();
        let jobs = self.apply_colors(state, &mut report);

        // Zones are independent; a failing zone never blocks the others
        let results = join_all(jobs.into_iter().map(|job| async move {
            let result = self
                .compositor
                .composite(job.background, &job.layers, None, self.output_scale)
                .await;
            (job, result)
        }))
        .await;

        for (job, result) in results {
            self.assign_texture(job, result, &mut report);
        }

        info!(
            colored = report.colored.len(),
            textured = report.textured.len(),
            cleared = report.cleared.len(),
            stale = report.stale.len(),
            failed = report.failed.len(),
            "Customization applied"
        );

        report
    }

    /// Synchronous pass: colors, cleared maps and the list of zones to texture
    fn apply_colors(&self, state: &CustomizationState, report: &mut BindReport) -> Vec<TextureJob> {
        let mut scene = self.scene.write();
        let mut jobs = Vec::new();

        for zone in Zone::ALL {
            let Some(slot) = scene.surface_mut(zone.mesh_name()) else {
                debug!(zone = %zone, "Zone not present in asset, skipping");
                report.missing.push(zone);
                continue;
            };

            let version = state.version(zone);
            if version < slot.applied_version {
                debug!(zone = %zone, version, current = slot.applied_version, "Stale snapshot for zone");
                report.stale.push(zone);
                continue;
            }
            slot.applied_version = version;

            let color = state.color(zone);
            slot.color = color;
            slot.needs_update = true;
            report.colored.push(zone);

            let layers = state.images(zone);
            if layers.is_empty() {
                if slot.map.take().is_some() {
                    debug!(zone = %zone, "Cleared color map");
                }
                report.cleared.push(zone);
            } else {
                jobs.push(TextureJob {
                    zone,
                    version,
                    background: color,
                    layers: layers.iter().map(LayerSource::from).collect(),
                });
            }
        }

        jobs
    }

    fn assign_texture(
        &self,
        job: TextureJob,
        result: Result<crate::engine::Texture, TextureError>,
        report: &mut BindReport,
    ) {
        let texture = match result {
            Ok(texture) => texture,
            Err(e) => {
                error!(zone = %job.zone, version = job.version, error = %e, "Texture generation failed");
                report.failed.push((job.zone, e.to_string()));
                return;
            }
        };

        let mut scene = self.scene.write();
        let Some(slot) = scene.surface_mut(job.zone.mesh_name()) else {
            report.missing.push(job.zone);
            return;
        };

        if slot.applied_version != job.version {
            debug!(
                zone = %job.zone,
                version = job.version,
                current = slot.applied_version,
                "Discarding superseded texture"
            );
            report.stale.push(job.zone);
            return;
        }

        slot.map = Some(TextureMap::clamped(texture));
        slot.needs_update = true;
        report.textured.push(job.zone);
    }

    /// Subscribe to `store` and re-apply on every change until the handle is dropped
    pub fn attach(self: Arc<Self>, store: Arc<CustomizationStore>) -> BinderHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let subscription = store.subscribe(move |change| {
            debug!(zone = %change.zone, kind = ?change.kind, version = change.version, "Customization changed");
            // Receiver gone means the binder is shutting down
            let _ = tx.send(());
        });

        let task_store = store.clone();
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Coalesce bursts; the snapshot covers all of them
                while rx.try_recv().is_ok() {}

                let snapshot = task_store.snapshot();
                let binder = self.clone();
                tokio::spawn(async move {
                    let report = binder.apply_customization(&snapshot).await;
                    if !report.is_clean() {
                        warn!(failed = ?report.failed, "Some zones failed to update");
                    }
                });
            }
            debug!("Binder listener stopped");
        });

        info!("Material binder attached to customization store");

        BinderHandle {
            store,
            subscription: Some(subscription),
            task,
        }
    }
}

/// Keeps a binder subscribed; detaches on drop
pub struct BinderHandle {
    store: Arc<CustomizationStore>,
    subscription: Option<SubscriptionId>,
    task: JoinHandle<()>,
}

impl BinderHandle {
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
            self.task.abort();
            info!("Material binder detached");
        }
    }
}

impl Drop for BinderHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitPolicy;
    use crate::domain::{TransformLimits, TransformPatch};
    use crate::engine::{is_uniform, FontBook, ImageFetcher, MemoryFetcher};
    use crate::scene::{MaterialScene, WrapMode};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::time::Duration;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    fn binder_with(fetcher: Arc<dyn ImageFetcher>, zones: &[Zone]) -> Arc<MaterialBinder> {
        let compositor = Arc::new(TextureCompositor::new(fetcher, FontBook::new(), FitPolicy::Natural));
        let scene = MaterialScene::with_zones(zones).into_shared();
        Arc::new(MaterialBinder::new(compositor, scene, 1.0))
    }

    fn store() -> CustomizationStore {
        CustomizationStore::new(TransformLimits::new(1.5))
    }

    fn fetcher() -> Arc<MemoryFetcher> {
        Arc::new(
            MemoryFetcher::default()
                .with("a", RgbaImage::from_pixel(20, 20, RED))
                .with("b", RgbaImage::from_pixel(10, 10, GREEN)),
        )
    }

    #[tokio::test]
    async fn test_flat_color_clears_map() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();

        let image = store.add_image(Zone::Strap, "a").unwrap();
        binder.apply_customization(&store.snapshot()).await;
        assert!(binder.scene().read().surface("Strap").unwrap().map.is_some());

        store.remove_image(Zone::Strap, image.id).unwrap();
        store.set_zone_color(Zone::Strap, HexColor::parse("#FF0000").unwrap());
        let report = binder.apply_customization(&store.snapshot()).await;

        let scene = binder.scene().read();
        let strap = scene.surface("Strap").unwrap();
        assert!(strap.map.is_none());
        assert_eq!(strap.color.to_string(), "#FF0000");
        assert!(report.cleared.contains(&Zone::Strap));
    }

    #[tokio::test]
    async fn test_textured_zone_gets_clamped_map() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();
        store.add_image(Zone::OuterPalm, "a").unwrap();

        let report = binder.apply_customization(&store.snapshot()).await;
        assert_eq!(report.textured, vec![Zone::OuterPalm]);

        let scene = binder.scene().read();
        let slot = scene.surface("Outer Palm").unwrap();
        let map = slot.map.as_ref().unwrap();
        assert_eq!(map.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(map.repeat, (1.0, 1.0));
        assert_eq!(map.image.get_pixel(256, 256), &RED);
        assert!(slot.needs_update);
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();
        let layer = store.add_image(Zone::OuterThumb, "a").unwrap();
        store
            .update_image_transform(Zone::OuterThumb, layer.id, &TransformPatch::rotation(30.0))
            .unwrap();
        store.set_zone_color(Zone::Fingers, HexColor::new(9, 9, 9));

        let snapshot = store.snapshot();
        binder.apply_customization(&snapshot).await;
        let once = binder.scene().read().clone();
        binder.apply_customization(&snapshot).await;
        let twice = binder.scene().read().clone();

        for zone in Zone::ALL {
            assert_eq!(once.surface(zone.mesh_name()), twice.surface(zone.mesh_name()), "zone {}", zone);
        }
    }

    #[tokio::test]
    async fn test_missing_zones_are_skipped() {
        let binder = binder_with(fetcher(), &[Zone::Strap, Zone::Fingers]);
        let store = store();
        store.add_image(Zone::OuterPalm, "a").unwrap();

        let report = binder.apply_customization(&store.snapshot()).await;

        assert!(report.missing.contains(&Zone::OuterPalm));
        assert_eq!(report.colored, vec![Zone::Fingers, Zone::Strap]);
        assert!(report.textured.is_empty());
    }

    #[tokio::test]
    async fn test_failing_zone_does_not_block_others() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();
        store.add_image(Zone::OuterPalm, "broken").unwrap();
        store.add_image(Zone::Strap, "a").unwrap();
        store.set_zone_color(Zone::Wrist, HexColor::new(1, 2, 3));

        let report = binder.apply_customization(&store.snapshot()).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, Zone::OuterPalm);
        assert_eq!(report.textured, vec![Zone::Strap]);

        let scene = binder.scene().read();
        assert_eq!(scene.surface("Wrist").unwrap().color, HexColor::new(1, 2, 3));
        assert!(scene.surface("Outer Palm").unwrap().map.is_none());
    }

    #[tokio::test]
    async fn test_strap_layers_painted_in_order() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();
        store.add_image(Zone::Strap, "a").unwrap();
        store.add_image(Zone::Strap, "b").unwrap();

        binder.apply_customization(&store.snapshot()).await;

        let scene = binder.scene().read();
        let map = scene.surface("Strap").unwrap().map.clone().unwrap();
        // B is painted last and occludes A where they overlap
        assert_eq!(map.image.get_pixel(256, 256), &GREEN);
        assert_eq!(map.image.get_pixel(248, 248), &RED);
    }

    #[tokio::test]
    async fn test_older_snapshot_never_overwrites_newer() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();
        store.add_image(Zone::Strap, "a").unwrap();
        let old = store.snapshot();
        store.set_zone_color(Zone::Strap, HexColor::new(0, 0, 200));
        let new = store.snapshot();

        binder.apply_customization(&new).await;
        let report = binder.apply_customization(&old).await;

        assert!(report.stale.contains(&Zone::Strap));
        let scene = binder.scene().read();
        let slot = scene.surface("Strap").unwrap();
        assert_eq!(slot.color, HexColor::new(0, 0, 200));
        assert_eq!(slot.map.as_ref().unwrap().image.get_pixel(0, 0), &Rgba([0, 0, 200, 255]));
    }

    /// Blocks fetches of "slow" until released
    struct GatedFetcher {
        inner: MemoryFetcher,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl ImageFetcher for GatedFetcher {
        async fn fetch(&self, url: &str) -> Result<DynamicImage, TextureError> {
            if url == "slow" {
                let _permit = self.gate.acquire().await.map_err(|e| TextureError::FetchFailed(e.to_string()))?;
            }
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn test_slow_stale_texture_is_discarded() {
        let fetcher = Arc::new(GatedFetcher {
            inner: MemoryFetcher::default()
                .with("slow", RgbaImage::from_pixel(4, 4, RED))
                .with("a", RgbaImage::from_pixel(4, 4, GREEN)),
            gate: tokio::sync::Semaphore::new(0),
        });
        let binder = binder_with(fetcher.clone(), &Zone::ALL);
        let store = store();

        let slow = store.add_image(Zone::Strap, "slow").unwrap();
        let old = store.snapshot();

        let stale_binder = binder.clone();
        let in_flight = tokio::spawn(async move { stale_binder.apply_customization(&old).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        store.remove_image(Zone::Strap, slow.id).unwrap();
        store.add_image(Zone::Strap, "a").unwrap();
        binder.apply_customization(&store.snapshot()).await;

        fetcher.gate.add_permits(1);
        let old_report = in_flight.await.unwrap();
        assert!(old_report.stale.contains(&Zone::Strap));

        let scene = binder.scene().read();
        let map = scene.surface("Strap").unwrap().map.clone().unwrap();
        assert_eq!(map.image.get_pixel(256, 256), &GREEN);
    }

    #[tokio::test]
    async fn test_attached_binder_follows_store() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = Arc::new(store());
        let handle = binder.clone().attach(store.clone());

        store.set_zone_color(Zone::Strap, HexColor::parse("#FF0000").unwrap());

        let mut applied = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if binder.scene().read().surface("Strap").unwrap().color == HexColor::new(255, 0, 0) {
                applied = true;
                break;
            }
        }
        assert!(applied, "binder did not react to the color change");

        handle.detach();
        store.set_zone_color(Zone::Strap, HexColor::new(0, 255, 0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(binder.scene().read().surface("Strap").unwrap().color, HexColor::new(255, 0, 0));
    }

    #[tokio::test]
    async fn test_empty_texture_zone_uses_flat_background() {
        let binder = binder_with(fetcher(), &Zone::ALL);
        let store = store();
        let layer = store.add_image(Zone::WristOutline, "a").unwrap();
        // Push the layer entirely off-canvas
        store
            .update_image_transform(Zone::WristOutline, layer.id, &TransformPatch::position(512.0, 512.0))
            .unwrap();

        binder.apply_customization(&store.snapshot()).await;

        let scene = binder.scene().read();
        let slot = scene.surface("Wrist Outline").unwrap();
        let color = Zone::WristOutline.default_color().to_rgba();
        assert!(is_uniform(&slot.map.as_ref().unwrap().image, color));
    }
}
