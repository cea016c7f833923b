// ── Device registry ──
//
// Owns `manifest.yaml`. Every mutation is a read-modify-write under one
// async mutex and is persisted before the lock is released, so concurrent
// device tasks can rename devices and stamp sync times without losing each
// other's updates.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Device, Manifest};
use crate::storage::write_atomic;

/// The persisted set of devices under management.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    manifest: Mutex<Manifest>,
}

impl Registry {
    /// Load the manifest at `path`. A missing file is an empty registry.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let manifest = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => Manifest::default(),
            Ok(text) => serde_yaml::from_str(&text).map_err(|e| CoreError::Registry {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Manifest::default(),
            Err(e) => {
                return Err(CoreError::Registry {
                    path,
                    message: e.to_string(),
                });
            }
        };
        debug!(path = %path.display(), devices = manifest.devices.len(), "loaded registry");
        Ok(Self {
            path,
            manifest: Mutex::new(manifest),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A point-in-time copy of the whole manifest.
    pub async fn snapshot(&self) -> Manifest {
        self.manifest.lock().await.clone()
    }

    /// Registered devices in manifest order.
    pub async fn devices(&self) -> Vec<Device> {
        self.manifest.lock().await.devices.clone()
    }

    pub async fn device(&self, device_id: &str) -> Option<Device> {
        self.manifest.lock().await.device(device_id).cloned()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert `device`, or replace the entry with the same id in place.
    pub async fn upsert_device(&self, device: Device) -> Result<(), CoreError> {
        self.mutate(|manifest| {
            match manifest.device_mut(&device.device_id) {
                Some(existing) => *existing = device,
                None => manifest.devices.push(device),
            }
            Ok(())
        })
        .await
    }

    /// Remove a device, returning the removed entry.
    pub async fn remove_device(&self, device_id: &str) -> Result<Device, CoreError> {
        self.mutate(|manifest| {
            let position = manifest
                .devices
                .iter()
                .position(|d| d.device_id == device_id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: device_id.to_owned(),
                })?;
            Ok(manifest.devices.remove(position))
        })
        .await
    }

    /// Record a new name and folder for a device.
    pub async fn rename_device(
        &self,
        device_id: &str,
        name: &str,
        folder: &str,
    ) -> Result<Device, CoreError> {
        self.mutate(|manifest| {
            let device = manifest
                .device_mut(device_id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: device_id.to_owned(),
                })?;
            name.clone_into(&mut device.name);
            folder.clone_into(&mut device.folder);
            Ok(device.clone())
        })
        .await
    }

    /// Stamp the last successful sync time.
    pub async fn touch_last_sync(&self, device_id: &str, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.mutate(|manifest| {
            let device = manifest
                .device_mut(device_id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: device_id.to_owned(),
                })?;
            device.last_sync = Some(at);
            Ok(())
        })
        .await
    }

    /// Apply `f` to a copy of the manifest, persist it, and only then make
    /// it current. A failed write leaves the in-memory state untouched.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Manifest) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut guard = self.manifest.lock().await;
        let mut next = guard.clone();
        let result = f(&mut next)?;

        let text = serde_yaml::to_string(&next).map_err(|e| CoreError::Registry {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&self.path, text.as_bytes())
            .await
            .map_err(|e| CoreError::Registry {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        *guard = next;
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::device_folder;

    fn device(id: &str, name: &str) -> Device {
        Device {
            device_id: id.into(),
            name: name.into(),
            folder: device_folder(name, id),
            ip_address: "192.168.1.10".into(),
            mac_address: String::new(),
            model: "SNSW-001X16EU".into(),
            last_sync: None,
        }
    }

    #[tokio::test]
    async fn missing_manifest_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Registry::load(tmp.path().join("manifest.yaml")).await.unwrap();
        let manifest = registry.snapshot().await;
        assert_eq!(manifest.version, "1.0");
        assert!(manifest.devices.is_empty());
    }

    #[tokio::test]
    async fn mutations_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.yaml");
        let registry = Registry::load(&path).await.unwrap();

        registry.upsert_device(device("shelly1-a", "Hallway")).await.unwrap();
        registry
            .rename_device("shelly1-a", "Porch", "porch-shelly1-a")
            .await
            .unwrap();

        let reloaded = Registry::load(&path).await.unwrap();
        let stored = reloaded.device("shelly1-a").await.unwrap();
        assert_eq!(stored.name, "Porch");
        assert_eq!(stored.folder, "porch-shelly1-a");

        assert!(matches!(
            reloaded.remove_device("nope").await,
            Err(CoreError::DeviceNotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_lose_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.yaml");
        let registry = Arc::new(Registry::load(&path).await.unwrap());

        for i in 0..16 {
            registry
                .upsert_device(device(&format!("shelly-{i}"), &format!("Device {i}")))
                .await
                .unwrap();
        }

        let now = Utc::now();
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let id = format!("shelly-{i}");
                if i % 2 == 0 {
                    registry
                        .rename_device(&id, &format!("Renamed {i}"), &format!("renamed-{i}-{id}"))
                        .await
                        .unwrap();
                }
                registry.touch_last_sync(&id, now).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = Registry::load(&path).await.unwrap().devices().await;
        assert_eq!(reloaded.len(), 16);
        for (i, device) in reloaded.iter().enumerate() {
            assert_eq!(device.last_sync, Some(now));
            if i % 2 == 0 {
                assert_eq!(device.name, format!("Renamed {i}"));
            }
        }
    }
}
