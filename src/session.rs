//! Customizer session
//!
//! Wires the customization store, the material binder and the upload client
//! for one application session.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::binder::{BinderHandle, MaterialBinder};
use crate::config::DeviceProfile;
use crate::domain::{TransformLimits, Zone};
use crate::state::CustomizationStore;
use crate::upload::{validate_file, ImageHost, UploadFile, UploadStatus};

pub struct CustomizerSession {
    store: Arc<CustomizationStore>,
    binder: Arc<MaterialBinder>,
    host: Arc<dyn ImageHost>,
    profile: DeviceProfile,
    status: RwLock<Option<UploadStatus>>,
    binding: RwLock<Option<BinderHandle>>,
}

impl CustomizerSession {
    pub fn new(binder: Arc<MaterialBinder>, host: Arc<dyn ImageHost>, profile: DeviceProfile) -> Self {
        let store = Arc::new(CustomizationStore::new(TransformLimits::new(profile.max_image_scale)));

        CustomizerSession {
            store,
            binder,
            host,
            profile,
            status: RwLock::new(None),
            binding: RwLock::new(None),
        }
    }

    /// Bind current state once and keep the scene in sync with later edits.
    /// Must run inside a tokio runtime.
    pub async fn start(&self) {
        let report = self.binder.apply_customization(&self.store.snapshot()).await;
        info!(colored = report.colored.len(), missing = report.missing.len(), "Initial materials bound");

        let handle = self.binder.clone().attach(self.store.clone());
        *self.binding.write() = Some(handle);
    }

    /// Stop reacting to state changes
    pub fn shutdown(&self) {
        if let Some(handle) = self.binding.write().take() {
            handle.detach();
        }
    }

    pub fn store(&self) -> &Arc<CustomizationStore> {
        &self.store
    }

    pub fn binder(&self) -> &Arc<MaterialBinder> {
        &self.binder
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Last upload status, if any upload was attempted
    pub fn status(&self) -> Option<UploadStatus> {
        self.status.read().clone()
    }

    /// Validate, upload and attach `file` to `zone`
    pub async fn process_file(&self, zone: Zone, file: UploadFile) -> UploadStatus {
        if !zone.accepts_images() {
            return self.record(UploadStatus::error(format!("{} does not accept images", zone)));
        }

        if let Err(e) = validate_file(&file, &self.profile) {
            warn!(zone = %zone, file = %file.name, error = %e, "Upload rejected");
            return self.record(UploadStatus::from(&e));
        }

        self.record(UploadStatus::loading());

        let Some(url) = self.host.upload(&file).await else {
            return self.record(UploadStatus::failed());
        };

        match self.store.add_image(zone, url) {
            Ok(layer) => {
                info!(zone = %zone, image_id = %layer.id, "Uploaded image attached");
                self.record(UploadStatus::success())
            }
            Err(e) => self.record(UploadStatus::error(e.to_string())),
        }
    }

    fn record(&self, status: UploadStatus) -> UploadStatus {
        *self.status.write() = Some(status.clone());
        status
    }
}

impl Drop for CustomizerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
