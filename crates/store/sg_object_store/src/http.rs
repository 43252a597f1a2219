use async_trait::async_trait;
use bytes::Bytes;
use sg_chunk_refs::BlockId;

use crate::{ByteRange, ObjectStore, ObjectStoreError};

/// Reads block segment files from an HTTP(S) object-storage gateway using byte-range `GET`
/// requests (`spec.md` §6: "Reads use byte-range requests").
///
/// Segment URLs are built as `<base_url>/<block_id>/chunks/<segment_file_id:06>`; adapt
/// [`Self::segment_url`] if the deployment uses a different layout.
pub struct HttpObjectStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn segment_url(&self, block_id: BlockId, segment_file_id: u32) -> String {
        format!(
            "{}/{block_id}/chunks/{segment_file_id:06}",
            self.base_url.trim_end_matches('/'),
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn read_range(
        &self,
        block_id: BlockId,
        segment_file_id: u32,
        range: ByteRange,
    ) -> Result<Bytes, ObjectStoreError> {
        let url = self.segment_url(block_id, segment_file_id);
        let last = range.offset + range.length - 1;

        let response = self
            .client
            .get(&url)
            .header("Range", format!("bytes={}-{last}", range.offset))
            .send()
            .await
            .map_err(|err| ObjectStoreError::Transport {
                block_id,
                segment_file_id,
                message: err.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound {
                block_id,
                segment_file_id,
            });
        }
        if response.status() == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(ObjectStoreError::RangeOutOfBounds {
                block_id,
                segment_file_id,
                message: format!("server rejected range bytes={}-{last}", range.offset),
            });
        }
        if !response.status().is_success() {
            return Err(ObjectStoreError::Transport {
                block_id,
                segment_file_id,
                message: format!("unexpected status {}", response.status()),
            });
        }

        response
            .bytes()
            .await
            .map_err(|err| ObjectStoreError::Transport {
                block_id,
                segment_file_id,
                message: err.to_string(),
            })
    }

    fn name(&self) -> &str {
        "http"
    }
}
