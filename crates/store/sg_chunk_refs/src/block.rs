/// Opaque block identifier.
///
/// Block discovery, tenant sharding and replica placement all live in the (external, out of
/// scope) block-metadata subsystem. This crate never constructs a [`BlockId`] itself -- it only
/// ever round-trips the ones handed to it by the reference stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(uuid::Uuid);

impl BlockId {
    #[inline]
    pub const fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque tenant identifier, used to namespace cache keys (see `sg_cache`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantId(String);

impl TenantId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
