//! Migration wire protocol.
//!
//! One transfer per connection: a length-prefixed bincode frame carrying a
//! [`UnitRecord`], answered by a single acknowledgement byte. The frame is a
//! u32 big-endian payload length followed by the payload; both sides enforce
//! the configured size limit.

use crate::{MigrationError, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The serialized form of a unit in flight between hosts.
///
/// Type tag, argument list, and the workload-specific resumable state
/// record (which embeds each stream's path and offset). File handles and
/// task state are excluded by construction — the destination re-derives
/// them via restore and lazy stream reattachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub type_name: String,
    pub arguments: Vec<String>,
    pub state: Vec<u8>,
}

/// Write one record frame.
pub async fn write_record<W>(writer: &mut W, record: &UnitRecord, max_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = bincode::serialize(record)?;
    if payload.len() > max_size {
        return Err(MigrationError::Oversized {
            size: payload.len(),
            max: max_size,
        });
    }

    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one record frame.
pub async fn read_record<R>(reader: &mut R, max_size: usize) -> Result<UnitRecord>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > max_size {
        return Err(MigrationError::Oversized {
            size: len,
            max: max_size,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

/// Write the transfer acknowledgement byte.
pub async fn write_ack<W>(writer: &mut W, accepted: bool) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&[u8::from(accepted)]).await?;
    writer.flush().await
}

/// Read the transfer acknowledgement byte.
pub async fn read_ack<R>(reader: &mut R) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).await?;
    Ok(byte[0] == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> UnitRecord {
        UnitRecord {
            type_name: "sort".to_string(),
            arguments: vec!["in.txt".to_string(), "out.txt".to_string()],
            state: vec![1, 2, 3, 4],
        }
    }

    #[tokio::test]
    async fn record_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let record = sample_record();

        write_record(&mut client, &record, 1024).await.unwrap();
        let received = read_record(&mut server, 1024).await.unwrap();

        assert_eq!(received.type_name, record.type_name);
        assert_eq!(received.arguments, record.arguments);
        assert_eq!(received.state, record.state);
    }

    #[tokio::test]
    async fn oversized_record_is_rejected_on_send() {
        let (mut client, _server) = tokio::io::duplex(4096);
        let record = sample_record();
        let result = write_record(&mut client, &record, 4).await;
        assert!(matches!(result, Err(MigrationError::Oversized { .. })));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_on_receive() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let result = read_record(&mut server, 1024).await;
        assert!(matches!(result, Err(MigrationError::Oversized { .. })));
    }

    #[tokio::test]
    async fn garbage_payload_is_a_codec_error() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(&8u32.to_be_bytes()).await.unwrap();
        client.write_all(&[0xff; 8]).await.unwrap();
        let result = read_record(&mut server, 1024).await;
        assert!(matches!(result, Err(MigrationError::Codec(_))));
    }

    #[tokio::test]
    async fn ack_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_ack(&mut server, true).await.unwrap();
        assert!(read_ack(&mut client).await.unwrap());
        write_ack(&mut server, false).await.unwrap();
        assert!(!read_ack(&mut client).await.unwrap());
    }
}
