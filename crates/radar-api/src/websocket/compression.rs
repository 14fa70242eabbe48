//! 프로젝션 프레임 압축.
//!
//! 프레임은 zlib 래핑된 deflate 스트림입니다. 압축은 블로킹 풀에서 실행되며,
//! 한 번의 변경에 대해 한 번만 압축하고 결과를 모든 구독자가 공유합니다.

use std::io::Write;
use std::time::Instant;

use axum::body::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::error;

use crate::metrics::record_compression_duration;

/// 구독자들이 공유하는 압축 대기 프레임.
///
/// 압축이 실패하면 `None`으로 완료되며, 해당 프레임은 모든 연결에서 건너뜁니다.
pub type PendingFrame = Shared<BoxFuture<'static, Option<Bytes>>>;

/// zlib 압축기.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: Compression,
}

impl Compressor {
    /// 압축 레벨(0-9)로 생성합니다. 범위를 넘으면 9로 제한합니다.
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// 현재 스레드에서 압축합니다.
    pub fn compress_blocking(&self, text: &str) -> Result<Vec<u8>, std::io::Error> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(text.len() / 2), self.level);
        encoder.write_all(text.as_bytes())?;
        encoder.finish()
    }

    /// 압축을 즉시 시작하고 공유 가능한 프레임을 반환합니다.
    pub fn compress_shared(&self, text: String) -> PendingFrame {
        let compressor = *self;
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || compressor.compress_blocking(&text));

        async move {
            match handle.await {
                Ok(Ok(compressed)) => {
                    record_compression_duration(started.elapsed().as_secs_f64());
                    Some(Bytes::from(compressed))
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Projection compression failed");
                    None
                }
                Err(e) => {
                    error!(error = %e, "Compression task failed");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

/// zlib 프레임을 해제합니다. 테스트와 진단용입니다.
pub fn decompress(frame: &[u8]) -> Result<String, std::io::Error> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut decoder = ZlibDecoder::new(frame);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_blocking_is_zlib() {
        let compressor = Compressor::new(6);
        let frame = compressor.compress_blocking(r#"{"callsign":"UAL100"}"#).unwrap();

        // zlib 헤더 (CMF = 0x78)
        assert_eq!(frame[0], 0x78);
        assert_eq!(decompress(&frame).unwrap(), r#"{"callsign":"UAL100"}"#);
    }

    #[tokio::test]
    async fn test_shared_frame_compresses_large_payload() {
        let compressor = Compressor::default();
        let text = "x".repeat(4096);
        let frame = compressor.compress_shared(text.clone()).await.unwrap();

        assert!(frame.len() < text.len());
        assert_eq!(decompress(&frame).unwrap(), text);
    }

    #[tokio::test]
    async fn test_shared_frame_resolves_once_for_all() {
        let compressor = Compressor::new(1);
        let pending = compressor.compress_shared("shared payload".to_string());
        let other = pending.clone();

        let (a, b) = tokio::join!(pending, other);
        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(decompress(&a).unwrap(), "shared payload");
    }

    #[test]
    fn test_level_is_clamped() {
        let compressor = Compressor::new(42);
        assert_eq!(compressor.level, Compression::new(9));
    }
}
