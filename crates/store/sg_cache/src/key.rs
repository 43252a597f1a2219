use sg_chunk_refs::{BlockId, TenantId};

/// An opaque cache key composed as `tenant | block_id | segment_file_id | offset | length`
/// (`spec.md` §6). Including both tenant and block in the key makes cross-tenant and cross-block
/// collisions structurally impossible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Box<[u8]>);

impl CacheKey {
    pub fn compose(
        tenant: &TenantId,
        block_id: BlockId,
        segment_file_id: u32,
        offset: u64,
        length: u64,
    ) -> Self {
        let tenant = tenant.as_str().as_bytes();
        let mut buf = Vec::with_capacity(tenant.len() + 1 + 16 + 4 + 8 + 8);
        buf.extend_from_slice(tenant);
        buf.push(0); // separator: tenant ids may not contain embedded NULs.
        buf.extend_from_slice(block_id.as_uuid().as_bytes());
        buf.extend_from_slice(&segment_file_id.to_be_bytes());
        buf.extend_from_slice(&offset.to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        Self(buf.into_boxed_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
