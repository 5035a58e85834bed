//! Length-prefixed message framing.
//!
//! Every message on the wire is a varint length prefix (1..=10 bytes,
//! LEB128) followed by a CBOR body. The hard maximum per message equals
//! the block size limit.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use quilt_core::MAX_BLOCK_BYTES;

use crate::error::{NetError, Result};

/// Append a LEB128 varint to a buffer.
pub fn encode_varint(mut n: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Read a LEB128 varint, at most ten bytes.
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64> {
    let mut value: u64 = 0;
    for shift in (0..64).step_by(7) {
        let byte = reader.read_u8().await?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(NetError::VarintOverflow)
}

/// Write one framed message.
pub async fn write_frame<T: Serialize, W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &T,
) -> Result<()> {
    let mut body = Vec::new();
    ciborium::into_writer(value, &mut body).map_err(|e| NetError::Encode(e.to_string()))?;
    if body.len() as u64 > MAX_BLOCK_BYTES {
        return Err(NetError::FrameTooLarge(body.len() as u64));
    }

    let mut prefix = Vec::with_capacity(10);
    encode_varint(body.len() as u64, &mut prefix);
    writer.write_all(&prefix).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message.
pub async fn read_frame<T: DeserializeOwned, R: AsyncRead + Unpin>(reader: &mut R) -> Result<T> {
    let len = read_varint(reader).await?;
    if len > MAX_BLOCK_BYTES {
        return Err(NetError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    ciborium::from_reader(body.as_slice()).map_err(|e| NetError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::HeadRequest;
    use quilt_core::ChannelName;

    #[test]
    fn test_varint_encoding() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xac, 0x02]),
        ];
        for (n, expected) in cases {
            let mut buf = Vec::new();
            encode_varint(n, &mut buf);
            assert_eq!(buf, expected, "encoding {n}");
        }
    }

    #[tokio::test]
    async fn test_varint_roundtrip() {
        for n in [0u64, 1, 127, 128, 16_383, 16_384, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(n, &mut buf);
            let mut cursor = std::io::Cursor::new(buf);
            assert_eq!(read_varint(&mut cursor).await.unwrap(), n);
        }
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let req = HeadRequest {
            channel: ChannelName::new("T").unwrap(),
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &req).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let recovered: HeadRequest = read_frame(&mut cursor).await.unwrap();
        assert_eq!(req, recovered);
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected() {
        // Hand-build a frame claiming more than the limit.
        let mut buf = Vec::new();
        encode_varint(MAX_BLOCK_BYTES + 1, &mut buf);
        let mut cursor = std::io::Cursor::new(buf);
        let result: Result<HeadRequest> = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(NetError::FrameTooLarge(_))));
    }
}
