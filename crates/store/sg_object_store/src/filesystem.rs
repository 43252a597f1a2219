use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use sg_chunk_refs::BlockId;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{ByteRange, ObjectStore, ObjectStoreError};

/// Reads block segment files laid out on a local (or network-mounted) filesystem, under
/// `<root>/<block_id>/chunks/<segment_file_id:06>`.
///
/// Mainly useful for local development and integration tests that want real file I/O without an
/// object-storage dependency.
pub struct LocalFsObjectStore {
    root: PathBuf,
}

impl LocalFsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn segment_path(&self, block_id: BlockId, segment_file_id: u32) -> PathBuf {
        self.root
            .join(block_id.to_string())
            .join("chunks")
            .join(format!("{segment_file_id:06}"))
    }
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn read_range(
        &self,
        block_id: BlockId,
        segment_file_id: u32,
        range: ByteRange,
    ) -> Result<Bytes, ObjectStoreError> {
        let path = self.segment_path(block_id, segment_file_id);

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|err| to_store_error(block_id, segment_file_id, &err))?;

        file.seek(SeekFrom::Start(range.offset))
            .await
            .map_err(|err| to_store_error(block_id, segment_file_id, &err))?;

        let mut buf = BytesMut::zeroed(range.length as usize);
        file.read_exact(&mut buf)
            .await
            .map_err(|err| to_store_error(block_id, segment_file_id, &err))?;

        Ok(buf.freeze())
    }

    fn name(&self) -> &str {
        "local_fs"
    }
}

fn to_store_error(block_id: BlockId, segment_file_id: u32, err: &std::io::Error) -> ObjectStoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ObjectStoreError::NotFound {
            block_id,
            segment_file_id,
        }
    } else if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ObjectStoreError::RangeOutOfBounds {
            block_id,
            segment_file_id,
            message: err.to_string(),
        }
    } else {
        ObjectStoreError::Transport {
            block_id,
            segment_file_id,
            message: err.to_string(),
        }
    }
}
