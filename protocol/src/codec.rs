//! Newline-delimited JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest accepted frame in bytes, newline included.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Framing and decoding failures.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame is not valid JSON for the expected message.
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame is not valid UTF-8.
    #[error("Frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Frame exceeds [`MAX_FRAME_LEN`]. The stream is no longer aligned on a
    /// frame boundary.
    #[error("Frame too large: more than {0} bytes")]
    FrameTooLarge(usize),
}

/// Encode a message as one line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Write a message and flush.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let line = encode_line(message)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next raw frame. `None` on a clean end of stream.
///
/// At most `MAX_FRAME_LEN + 1` bytes are buffered per frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<String>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_FRAME_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if read > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(MAX_FRAME_LEN));
        }
        let line = String::from_utf8(buf)?;
        // Blank lines are keep-alives.
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
        buf = line.into_bytes();
    }
}

/// Read and decode the next message. `None` on a clean end of stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(line) => Ok(Some(decode_line(&line)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Call, Request};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_write_then_read() {
        let request = Request::new(Call::GetBalance {
            token: "zambam".to_string(),
        });

        let mut buffer = Vec::new();
        write_message(&mut buffer, &request).await.unwrap();
        assert!(buffer.ends_with(b"\n"));

        let mut reader = BufReader::new(buffer.as_slice());
        let decoded: Request = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded, request);
        assert!(read_message::<_, Request>(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frames_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"version\":\"1.0\",\"id\":\"019456ab-1234-7def-8901-234567890abc\",")
            .read(b"\"method\":\"get_balance\",\"token\":\"T1\"}\n")
            .build();
        let mut reader = BufReader::new(mock);

        let request: Request = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.call.method(), "get_balance");
    }

    #[tokio::test]
    async fn test_write_is_one_line() {
        let mut mock = tokio_test::io::Builder::new().write(b"\"ping\"\n").build();
        write_message(&mut mock, &"ping").await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_blank_lines() {
        let mut reader = BufReader::new(&b"\n  \n{\"a\":1}\n"[..]);
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.trim(), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_rejects_oversized_frame() {
        let big = format!("{}\n", "x".repeat(MAX_FRAME_LEN + 1));
        let mut reader = BufReader::new(big.as_bytes());
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_endless_line_is_cut_off() {
        let mut reader = BufReader::new(tokio::io::repeat(b'x'));
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(ProtocolError::FrameTooLarge(MAX_FRAME_LEN))
        ));
    }

    #[tokio::test]
    async fn test_frame_at_limit_is_accepted() {
        let line = format!("{}\n", "x".repeat(MAX_FRAME_LEN - 1));
        let mut reader = BufReader::new(line.as_bytes());
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.len(), MAX_FRAME_LEN);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decode_error() {
        let mut reader = BufReader::new(&b"\xff\xfe{}\n{\"a\":1}\n"[..]);
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(ProtocolError::InvalidUtf8(_))
        ));
        // The bad frame is consumed whole; the next one is intact.
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.trim(), "{\"a\":1}");
    }

    #[test]
    fn test_malformed_line() {
        assert!(matches!(
            decode_line::<Request>("{\"method\":\"nope\"}"),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
