use std::path::Path;

use tracing::{info, warn};

use crate::client::LifecycleClient;
use crate::error::Result;
use crate::store::{Store, StoreReader};
use crate::types::{Device, UploadOutcome};

/// Everything a device list view renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryState {
    pub devices: Vec<Device>,
    pub loading: bool,
    /// Message of the last failed refresh or upload, cleared on success.
    pub error: Option<String>,
    pub upload_message: Option<String>,
    pub total_uploaded: u64,
}

impl InventoryState {
    /// Devices with a SUCCESS or PENDING status.
    pub fn displayable(&self) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| d.status.is_displayable())
            .collect()
    }
}

/// Owns the device list and keeps it in step with the backend.
///
/// A failed refresh records the error but keeps the previous list.
#[derive(Debug)]
pub struct DeviceInventory {
    client: LifecycleClient,
    state: Store<InventoryState>,
}

impl DeviceInventory {
    pub fn new(client: LifecycleClient) -> Self {
        Self {
            client,
            state: Store::default(),
        }
    }

    pub fn reader(&self) -> StoreReader<InventoryState> {
        self.state.reader()
    }

    pub fn state(&self) -> InventoryState {
        self.state.snapshot()
    }

    /// Currently displayable devices, cloned.
    pub fn displayable(&self) -> Vec<Device> {
        self.state().displayable().into_iter().cloned().collect()
    }

    /// Reload the full device list.
    pub async fn refresh(&self) -> Result<usize> {
        self.set_loading();
        match self.client.devices().await {
            Ok(devices) => {
                let count = devices.len();
                self.state.update(|s| {
                    s.devices = devices;
                    s.loading = false;
                    s.error = None;
                    true
                });
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Device refresh failed, keeping previous list");
                self.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Upload a device list file, recording the outcome.
    pub async fn upload<F>(&self, path: impl AsRef<Path>, progress: F) -> Result<UploadOutcome>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.set_loading();
        let result = self.client.upload_devices(path, progress).await;
        self.finish_upload(result)
    }

    /// Upload an in-memory device list, recording the outcome.
    pub async fn upload_bytes<F>(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        progress: F,
    ) -> Result<UploadOutcome>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.set_loading();
        let result = self.client.upload_device_bytes(file_name, bytes, progress).await;
        self.finish_upload(result)
    }

    fn finish_upload(&self, result: Result<UploadOutcome>) -> Result<UploadOutcome> {
        match result {
            Ok(outcome) => {
                info!(total = outcome.total_devices, "Device upload accepted");
                self.state.update(|s| {
                    s.loading = false;
                    s.error = None;
                    s.upload_message = Some(outcome.message.clone());
                    s.total_uploaded = outcome.total_devices;
                    true
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Device upload failed");
                self.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    fn set_loading(&self) {
        self.state.update(|s| !std::mem::replace(&mut s.loading, true));
    }

    fn record_failure(&self, message: &str) {
        self.state.update(|s| {
            s.loading = false;
            s.error = Some(message.to_string());
            true
        });
    }
}
