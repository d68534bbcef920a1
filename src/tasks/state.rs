use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{
    domain::{Fingerprint, SurfaceId},
    notify::NotificationDedup,
};

#[derive(Debug, Default)]
pub struct PipelineState {
    last_fingerprints: Mutex<HashMap<SurfaceId, Fingerprint>>,
    dedup: NotificationDedup,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_fingerprint(&self, surface: SurfaceId, fingerprint: &Fingerprint) -> bool {
        let mut last = self.last_fingerprints.lock();
        if last.get(&surface) == Some(fingerprint) {
            return false;
        }
        last.insert(surface, fingerprint.clone());
        true
    }

    pub fn dedup(&self) -> &NotificationDedup {
        &self.dedup
    }

    pub fn forget(&self, surface: SurfaceId) {
        self.last_fingerprints.lock().remove(&surface);
        self.dedup.forget(surface);
    }
}
