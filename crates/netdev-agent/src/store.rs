//! Access to the `NetworkDevice` resource.
//!
//! The agent reads the full resource and writes only its status. Every write
//! reads the current status first, changes only the fields the caller
//! touches, and replaces the whole status subresource. The write carries the
//! `resourceVersion` of that read, so a concurrent writer causes a conflict
//! instead of a lost update. Emptied fields disappear from the stored status.

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use netdev_core::{NetworkDevice, NetworkDeviceStatus};

use crate::error::{AgentError, Result};

/// A status mutation applied during a read-modify-write.
pub type StatusMutation<'a> = &'a (dyn Fn(&mut NetworkDeviceStatus) + Send + Sync);

/// Read and status-write access to device resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the resource named `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource does not exist, or an API error.
    async fn get(&self, name: &str) -> Result<NetworkDevice>;

    /// Read the current status, apply `mutate`, and write the full status
    /// back. Returns the updated resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the write fails.
    async fn update_status(&self, name: &str, mutate: StatusMutation<'_>) -> Result<NetworkDevice>;
}

/// Resource store backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeResourceStore {
    api: Api<NetworkDevice>,
}

impl KubeResourceStore {
    /// Create a store over `api`.
    #[must_use]
    pub fn new(api: Api<NetworkDevice>) -> Self {
        Self { api }
    }
}

/// Apply `mutate` to the status of `device` and encode the result as a
/// status replacement body.
///
/// # Errors
///
/// Returns an error if the resource cannot be serialized.
pub fn status_replacement(mut device: NetworkDevice, mutate: StatusMutation<'_>) -> Result<Vec<u8>> {
    let mut status = device.status.take().unwrap_or_default();
    mutate(&mut status);
    device.status = Some(status);
    serde_json::to_vec(&device)
        .map_err(|e| AgentError::Internal(format!("failed to encode status: {e}")))
}

fn not_found(name: &str, err: kube::Error) -> AgentError {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => {
            AgentError::NotFound(name.to_string())
        }
        other => AgentError::KubeApi(other),
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(&self, name: &str) -> Result<NetworkDevice> {
        self.api.get(name).await.map_err(|e| not_found(name, e))
    }

    async fn update_status(&self, name: &str, mutate: StatusMutation<'_>) -> Result<NetworkDevice> {
        let device = self.get(name).await?;
        let body = status_replacement(device, mutate)?;
        self.api
            .replace_status(name, &PostParams::default(), body)
            .await
            .map_err(|e| not_found(name, e))
    }
}

/// An in-memory store for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A store that keeps resources in memory and counts status writes.
    #[derive(Default)]
    pub struct InMemoryResourceStore {
        devices: Mutex<HashMap<String, NetworkDevice>>,
        status_writes: Mutex<usize>,
        fail_writes: Mutex<bool>,
    }

    impl InMemoryResourceStore {
        /// Create an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert or replace a resource.
        pub fn insert(&self, device: NetworkDevice) {
            let name = device.metadata.name.clone().unwrap_or_default();
            self.devices.lock().insert(name, device);
        }

        /// Current copy of a resource.
        #[must_use]
        pub fn device(&self, name: &str) -> Option<NetworkDevice> {
            self.devices.lock().get(name).cloned()
        }

        /// Current status of a resource, default when unset.
        #[must_use]
        pub fn status(&self, name: &str) -> NetworkDeviceStatus {
            self.device(name)
                .and_then(|d| d.status)
                .unwrap_or_default()
        }

        /// Number of successful status writes.
        #[must_use]
        pub fn status_writes(&self) -> usize {
            *self.status_writes.lock()
        }

        /// Make status writes fail.
        pub fn set_fail_writes(&self, fail: bool) {
            *self.fail_writes.lock() = fail;
        }
    }

    #[async_trait]
    impl ResourceStore for InMemoryResourceStore {
        async fn get(&self, name: &str) -> Result<NetworkDevice> {
            self.device(name)
                .ok_or_else(|| AgentError::NotFound(name.to_string()))
        }

        async fn update_status(
            &self,
            name: &str,
            mutate: StatusMutation<'_>,
        ) -> Result<NetworkDevice> {
            if *self.fail_writes.lock() {
                return Err(AgentError::Internal("status write rejected".into()));
            }

            let mut devices = self.devices.lock();
            let device = devices
                .get_mut(name)
                .ok_or_else(|| AgentError::NotFound(name.to_string()))?;

            // Round-trip through the wire form so stored state matches what
            // the API server would keep.
            let body = status_replacement(device.clone(), mutate)?;
            *device = serde_json::from_slice(&body)
                .map_err(|e| AgentError::Internal(format!("failed to decode status: {e}")))?;
            *self.status_writes.lock() += 1;
            Ok(device.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryResourceStore;
    use super::*;
    use netdev_core::{NetworkDeviceSpec, PreloadPhase};

    fn device(name: &str) -> NetworkDevice {
        NetworkDevice::new(name, NetworkDeviceSpec::default())
    }

    #[tokio::test]
    async fn update_preserves_untouched_fields() {
        let store = InMemoryResourceStore::new();
        store.insert(device("leaf-01"));

        store
            .update_status("leaf-01", &|s| s.os.current_version = "A".into())
            .await
            .unwrap();
        let updated = store
            .update_status("leaf-01", &|s| s.preload.phase = Some(PreloadPhase::Succeeded))
            .await
            .unwrap();

        let status = updated.status.unwrap();
        assert_eq!(status.os.current_version, "A");
        assert_eq!(status.preload.phase, Some(PreloadPhase::Succeeded));
        assert_eq!(store.status_writes(), 2);
    }

    #[test]
    fn replacement_drops_cleared_fields_and_keeps_resource_version() {
        let mut stored = device("leaf-01");
        stored.metadata.resource_version = Some("42".into());
        stored.status = Some(NetworkDeviceStatus::default());
        if let Some(status) = stored.status.as_mut() {
            status.preload.phase = Some(PreloadPhase::Failed);
            status.preload.message = "connection refused".into();
        }

        let body = status_replacement(stored, &|s| {
            s.preload.phase = Some(PreloadPhase::Succeeded);
            s.preload.message.clear();
        })
        .unwrap();

        let written: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(written["metadata"]["resourceVersion"], "42");
        assert_eq!(written["status"]["preload"]["phase"], "Succeeded");
        assert!(written["status"]["preload"].get("message").is_none());

        // Replacing the stored status with this body leaves no stale message.
        let replaced: NetworkDevice = serde_json::from_slice(&body).unwrap();
        assert!(replaced.status.unwrap().preload.message.is_empty());
    }

    #[tokio::test]
    async fn cleared_message_does_not_survive_a_write() {
        let store = InMemoryResourceStore::new();
        store.insert(device("leaf-01"));

        store
            .update_status("leaf-01", &|s| {
                s.preload.phase = Some(PreloadPhase::Failed);
                s.preload.message = "connection refused".into();
            })
            .await
            .unwrap();
        store
            .update_status("leaf-01", &|s| {
                s.preload.phase = Some(PreloadPhase::Succeeded);
                s.preload.message.clear();
            })
            .await
            .unwrap();

        let status = store.status("leaf-01");
        assert_eq!(status.preload.phase, Some(PreloadPhase::Succeeded));
        assert!(status.preload.message.is_empty());
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let store = InMemoryResourceStore::new();
        let err = store.get("ghost").await.unwrap_err();
        assert!(matches!(err, AgentError::NotFound(_)));
        assert!(store.update_status("ghost", &|_| {}).await.is_err());
    }
}
