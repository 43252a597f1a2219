use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sg_telemetry::PipelineMetrics;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::warn;

use crate::{CacheAdapter, CacheKey, CacheMap};

/// A client for the ASCII memcached wire protocol, hand-rolled the way the teacher hand-rolls its
/// own network protocols (`SPEC_FULL.md` §4.5) rather than pulling in a memcache crate.
///
/// Opens one fresh connection per `store`/`fetch` call. That's adequate for a demo/reference
/// adapter; a production deployment would pool connections, which is out of scope here.
pub struct MemcachedCacheAdapter {
    name: String,
    address: String,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl MemcachedCacheAdapter {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn connect(&self) -> std::io::Result<TcpStream> {
        TcpStream::connect(&self.address).await
    }

    fn encode_key(key: &CacheKey) -> String {
        // memcached keys must be printable ASCII with no whitespace; base64 keeps our opaque
        // composed byte strings within that alphabet.
        base64_encode(key.as_bytes())
    }
}

#[async_trait]
impl CacheAdapter for MemcachedCacheAdapter {
    async fn store(&self, items: CacheMap, ttl: Duration) {
        if items.is_empty() {
            return;
        }

        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(cache = %self.name, error = %err, count = items.len(), "memcached store: connect failed");
                return;
            }
        };

        let ttl_secs = ttl.as_secs();
        let mut failures = 0usize;
        let mut first_cause = None;

        for (key, value) in &items {
            let request = format!(
                "set {} 0 {} {}\r\n",
                Self::encode_key(key),
                ttl_secs,
                value.len(),
            );
            let result: std::io::Result<()> = async {
                stream.write_all(request.as_bytes()).await?;
                stream.write_all(value).await?;
                stream.write_all(b"\r\n").await?;
                let mut reply = String::new();
                BufReader::new(&mut stream).read_line(&mut reply).await?;
                Ok(())
            }
            .await;

            if let Err(err) = result {
                failures += 1;
                first_cause.get_or_insert(err.to_string());
            }
        }

        if failures > 0 {
            warn!(
                cache = %self.name,
                failures,
                cause = first_cause.as_deref().unwrap_or("unknown"),
                "memcached store: some keys failed",
            );
        }
    }

    async fn fetch(&self, keys: &[CacheKey]) -> CacheMap {
        if keys.is_empty() {
            return CacheMap::default();
        }

        let hits = match self.fetch_inner(keys).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(cache = %self.name, error = %err, "memcached fetch: treating as miss-all");
                CacheMap::default()
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_request(&self.name, keys.len(), hits.len());
        }
        hits
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl MemcachedCacheAdapter {
    async fn fetch_inner(&self, keys: &[CacheKey]) -> std::io::Result<CacheMap> {
        let mut stream = self.connect().await?;

        let encoded: Vec<String> = keys.iter().map(Self::encode_key).collect();
        let request = format!("get {}\r\n", encoded.join(" "));
        stream.write_all(request.as_bytes()).await?;

        let by_encoded: std::collections::HashMap<&str, &CacheKey> =
            encoded.iter().map(|s| s.as_str()).zip(keys.iter()).collect();

        let mut reader = BufReader::new(stream);
        let mut hits = CacheMap::default();

        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            let line = line.trim_end_matches("\r\n");
            if line == "END" || line.is_empty() {
                break;
            }

            let mut parts = line.split(' ');
            if parts.next() != Some("VALUE") {
                break;
            }
            let encoded_key = parts.next().unwrap_or_default().to_owned();
            let _flags = parts.next();
            let length: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);

            let mut data = vec![0u8; length];
            reader.read_exact(&mut data).await?;
            let mut crlf = [0u8; 2];
            reader.read_exact(&mut crlf).await?;

            if let Some(key) = by_encoded.get(encoded_key.as_str()) {
                hits.insert((*key).clone(), Bytes::from(data));
            }
        }

        Ok(hits)
    }
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn base64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);

        out.push(BASE64_ALPHABET[(b0 >> 2) as usize] as char);
        out.push(BASE64_ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        if chunk.len() > 1 {
            out.push(BASE64_ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char);
        }
        if chunk.len() > 2 {
            out.push(BASE64_ALPHABET[(b2 & 0x3f) as usize] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_is_printable_ascii() {
        let encoded = base64_encode(&[0, 1, 2, 255, 254, 253]);
        assert!(encoded.bytes().all(|b| b.is_ascii_graphic()));
    }
}
