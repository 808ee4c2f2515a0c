//! Customization state store
//!
//! Single source of truth for zone colors and image layers. Every mutation is
//! synchronous, bumps the mutated zone's version and notifies subscribers once
//! the state lock has been released.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{HexColor, ImageLayer, TransformLimits, TransformPatch, Zone};

/// State mutation errors
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("Zone {0} does not accept images")]
    ZoneRejectsImages(Zone),
    #[error("Image {id} not found in zone {zone}")]
    ImageNotFound { zone: Zone, id: Uuid },
}

/// What kind of edit produced a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Color,
    ImageAdded,
    ImageRemoved,
    TransformUpdated,
}

/// Notification delivered to subscribers after each mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub zone: Zone,
    pub kind: ChangeKind,
    pub version: u64,
}

/// Point-in-time copy of all customization data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomizationState {
    pub colors: BTreeMap<Zone, HexColor>,
    pub images: BTreeMap<Zone, Vec<ImageLayer>>,
    /// Per-zone version, bumped on every mutation of that zone
    pub versions: BTreeMap<Zone, u64>,
}

impl Default for CustomizationState {
    fn default() -> Self {
        CustomizationState {
            colors: Zone::ALL.iter().map(|z| (*z, z.default_color())).collect(),
            images: Zone::IMAGE_ZONES.iter().map(|z| (*z, Vec::new())).collect(),
            versions: Zone::ALL.iter().map(|z| (*z, 0)).collect(),
        }
    }
}

impl CustomizationState {
    pub fn color(&self, zone: Zone) -> HexColor {
        self.colors.get(&zone).copied().unwrap_or_else(|| zone.default_color())
    }

    pub fn images(&self, zone: Zone) -> &[ImageLayer] {
        self.images.get(&zone).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn version(&self, zone: Zone) -> u64 {
        self.versions.get(&zone).copied().unwrap_or(0)
    }

    fn bump(&mut self, zone: Zone) -> u64 {
        let version = self.versions.entry(zone).or_insert(0);
        *version += 1;
        *version
    }

    fn layers_mut(&mut self, zone: Zone) -> Result<&mut Vec<ImageLayer>, StateError> {
        if !zone.accepts_images() {
            return Err(StateError::ZoneRejectsImages(zone));
        }
        Ok(self.images.entry(zone).or_default())
    }
}

/// Subscription handle returned by [`CustomizationStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Owns the session's [`CustomizationState`] and its observers
pub struct CustomizationStore {
    state: RwLock<CustomizationState>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    limits: TransformLimits,
}

impl CustomizationStore {
    pub fn new(limits: TransformLimits) -> Self {
        CustomizationStore {
            state: RwLock::new(CustomizationState::default()),
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            limits,
        }
    }

    pub fn limits(&self) -> TransformLimits {
        self.limits
    }

    /// Consistent copy of the current state
    pub fn snapshot(&self) -> CustomizationState {
        self.state.read().clone()
    }

    /// Register a change listener. Listeners run synchronously on the mutating thread.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        debug!(subscription = id.0, "Listener subscribed");
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        let removed = listeners.len() != before;
        if removed {
            debug!(subscription = id.0, "Listener unsubscribed");
        }
        removed
    }

    pub fn set_zone_color(&self, zone: Zone, color: HexColor) -> StateChange {
        let version = {
            let mut state = self.state.write();
            state.colors.insert(zone, color);
            state.bump(zone)
        };

        debug!(zone = %zone, color = %color, version, "Zone color set");
        self.notify(StateChange { zone, kind: ChangeKind::Color, version })
    }

    /// Append a new layer at the default transform
    pub fn add_image(&self, zone: Zone, url: impl Into<String>) -> Result<ImageLayer, StateError> {
        let layer = ImageLayer::new(url);
        let version = {
            let mut state = self.state.write();
            state.layers_mut(zone)?.push(layer.clone());
            state.bump(zone)
        };

        info!(zone = %zone, image_id = %layer.id, version, "Image added");
        self.notify(StateChange { zone, kind: ChangeKind::ImageAdded, version });
        Ok(layer)
    }

    pub fn remove_image(&self, zone: Zone, id: Uuid) -> Result<ImageLayer, StateError> {
        let (removed, version) = {
            let mut state = self.state.write();
            let layers = state.layers_mut(zone)?;
            let index = layers
                .iter()
                .position(|layer| layer.id == id)
                .ok_or(StateError::ImageNotFound { zone, id })?;
            let removed = layers.remove(index);
            (removed, state.bump(zone))
        };

        info!(zone = %zone, image_id = %id, version, "Image removed");
        self.notify(StateChange { zone, kind: ChangeKind::ImageRemoved, version });
        Ok(removed)
    }

    /// Merge `patch` into the layer's transform; scale is clamped to the device range
    pub fn update_image_transform(
        &self,
        zone: Zone,
        id: Uuid,
        patch: &TransformPatch,
    ) -> Result<ImageLayer, StateError> {
        let limits = self.limits;
        let (updated, version) = {
            let mut state = self.state.write();
            let layer = state
                .layers_mut(zone)?
                .iter_mut()
                .find(|layer| layer.id == id)
                .ok_or(StateError::ImageNotFound { zone, id })?;
            layer.transform.apply(patch, &limits);
            let updated = layer.clone();
            (updated, state.bump(zone))
        };

        debug!(zone = %zone, image_id = %id, transform = ?updated.transform, version, "Transform updated");
        self.notify(StateChange { zone, kind: ChangeKind::TransformUpdated, version });
        Ok(updated)
    }

    fn notify(&self, change: StateChange) -> StateChange {
        // Clone out so listeners may subscribe/unsubscribe re-entrantly
        let listeners: Vec<Listener> = self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&change);
        }
        change
    }
}
