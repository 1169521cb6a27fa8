//! File-backed binding store, optionally encrypted at rest.

use super::{BindOutcome, BindingStore, DeviceBinding};
use crate::error::StoreError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use async_trait::async_trait;
use rand::RngCore;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Nonce size for AES-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Bindings kept in memory and written through to a single file.
///
/// File format is the JSON map `{ "<user_id>": DeviceBinding }`, or, with a
/// key configured, `[12 bytes nonce][AES-256-GCM ciphertext with tag]` of it.
/// The mutex is held across check, insert and write, which makes
/// `bind_if_absent` atomic within the process.
pub struct FileStore {
    path: PathBuf,
    key: Option<[u8; 32]>,
    records: Mutex<HashMap<i64, DeviceBinding>>,
}

impl FileStore {
    /// Open the store, loading existing bindings if the file exists.
    pub async fn open(path: PathBuf, key: Option<[u8; 32]>) -> Result<Self, StoreError> {
        let store = Self {
            path,
            key,
            records: Mutex::new(HashMap::new()),
        };

        let records = store.load().await?;
        info!(
            "Loaded {} device bindings from {:?}",
            records.len(),
            store.path
        );
        *store.records.lock().await = records;

        Ok(store)
    }

    async fn load(&self) -> Result<HashMap<i64, DeviceBinding>, StoreError> {
        if !fs::try_exists(&self.path).await? {
            info!("Binding file not found at {:?}, starting empty", self.path);
            return Ok(HashMap::new());
        }

        let data = fs::read(&self.path).await?;
        let plaintext = self.unseal(&data)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    async fn persist(&self, records: &HashMap<i64, DeviceBinding>) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(records)?;
        let data = self.seal(plaintext)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file + rename; the data must be on
        // disk before the rename makes it visible.
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;

        debug!("Saved {} bytes of bindings to {:?}", data.len(), self.path);
        Ok(())
    }

    fn seal(&self, plaintext: Vec<u8>) -> Result<Vec<u8>, StoreError> {
        let Some(key) = &self.key else {
            return Ok(plaintext);
        };
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, plaintext.as_ref())?;

        let mut data = nonce_bytes.to_vec();
        data.extend(ciphertext);
        Ok(data)
    }

    fn unseal(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        let Some(key) = &self.key else {
            return Ok(data.to_vec());
        };

        if data.len() < NONCE_SIZE {
            return Err(StoreError::Encryption("binding file too short".into()));
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);

        cipher.decrypt(nonce, &data[NONCE_SIZE..]).map_err(|_| {
            StoreError::Encryption(
                "Failed to decrypt bindings. Was the encryption key changed?".to_string(),
            )
        })
    }
}

#[async_trait]
impl BindingStore for FileStore {
    async fn get(&self, user_id: i64) -> Result<Option<DeviceBinding>, StoreError> {
        Ok(self.records.lock().await.get(&user_id).cloned())
    }

    async fn bind_if_absent(
        &self,
        user_id: i64,
        binding: DeviceBinding,
    ) -> Result<BindOutcome, StoreError> {
        let mut records = self.records.lock().await;

        if let Some(existing) = records.get(&user_id) {
            return Ok(BindOutcome::Existing(existing.clone()));
        }

        records.insert(user_id, binding.clone());
        if let Err(e) = self.persist(&records).await {
            warn!(user_id, error = %e, "Failed to persist binding, rolling back");
            records.remove(&user_id);
            return Err(e);
        }

        Ok(BindOutcome::Created(binding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn binding(device: &str) -> DeviceBinding {
        DeviceBinding::new(device, "2001:db8::1".parse().unwrap())
    }

    #[tokio::test]
    async fn test_bindings_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.json");

        let store = FileStore::open(path.clone(), None).await.unwrap();
        assert!(matches!(
            store.bind_if_absent(42, binding("phone")).await.unwrap(),
            BindOutcome::Created(_)
        ));
        drop(store);

        let reopened = FileStore::open(path.clone(), None).await.unwrap();
        let stored = reopened.get(42).await.unwrap().unwrap();
        assert_eq!(stored.device_id, "phone");

        // Plain JSON keyed by user id.
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["42"]["deviceId"], "phone");

        assert!(matches!(
            reopened.bind_if_absent(42, binding("laptop")).await.unwrap(),
            BindOutcome::Existing(ref b) if b.device_id == "phone"
        ));
    }

    #[tokio::test]
    async fn test_persist_leaves_complete_file_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.json");

        let store = FileStore::open(path.clone(), None).await.unwrap();
        store.bind_if_absent(1, binding("phone")).await.unwrap();
        store.bind_if_absent(2, binding("tablet")).await.unwrap();

        assert!(!path.with_extension("tmp").exists());
        let raw: HashMap<i64, DeviceBinding> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_binds_create_one_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.json");
        let store = Arc::new(FileStore::open(path.clone(), None).await.unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .bind_if_absent(42, binding(&format!("device-{}", i)))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut created = Vec::new();
        let mut observed = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                BindOutcome::Created(b) => created.push(b.device_id),
                BindOutcome::Existing(b) => observed.push(b.device_id),
            }
        }

        assert_eq!(created.len(), 1);
        assert!(observed.iter().all(|device| *device == created[0]));

        // What reached disk is the winner.
        let reopened = FileStore::open(path, None).await.unwrap();
        assert_eq!(reopened.get(42).await.unwrap().unwrap().device_id, created[0]);
    }

    #[tokio::test]
    async fn test_encrypted_file_is_opaque() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.enc");
        let key = [0x42u8; 32];

        let store = FileStore::open(path.clone(), Some(key)).await.unwrap();
        store.bind_if_absent(7, binding("tablet")).await.unwrap();

        let data = std::fs::read(&path).unwrap();
        assert!(data.len() > NONCE_SIZE);
        assert!(!String::from_utf8_lossy(&data).contains("tablet"));

        let reopened = FileStore::open(path, Some(key)).await.unwrap();
        assert_eq!(reopened.get(7).await.unwrap().unwrap().device_id, "tablet");
    }

    #[tokio::test]
    async fn test_wrong_key_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bindings.enc");

        let store = FileStore::open(path.clone(), Some([0x42u8; 32])).await.unwrap();
        store.bind_if_absent(7, binding("tablet")).await.unwrap();

        let result = FileStore::open(path, Some([0x43u8; 32])).await;
        assert!(matches!(result, Err(StoreError::Encryption(_))));
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let dir = TempDir::new().unwrap();
        // The store path is a directory, so the final rename fails.
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("child"), b"x").unwrap();

        let store = FileStore {
            path,
            key: None,
            records: Mutex::new(HashMap::new()),
        };

        assert!(store.bind_if_absent(42, binding("phone")).await.is_err());
        assert!(store.get(42).await.unwrap().is_none());
    }
}
