//! Where batch decoders fetch blob bodies from.

use async_trait::async_trait;
use tether_core::BlobEntry;
use tether_storage::StorageGateway;

/// Fetches the body of a listed blob. Failures read as empty bytes.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch(&self, entry: &BlobEntry) -> Vec<u8>;
}

#[async_trait]
impl BlobSource for StorageGateway {
    async fn fetch(&self, entry: &BlobEntry) -> Vec<u8> {
        self.download_object(entry.container, &entry.path).await
    }
}
