//! Labelled forwarding of a child process output stream

use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read buffer size; the relay never holds more than one chunk in memory
const CHUNK_SIZE: usize = 8 * 1024;

/// Forward `reader` to `writer` chunk by chunk, prefixing every chunk with `[label] `
///
/// Returns the number of payload bytes relayed (prefixes excluded). The prefix and
/// the chunk go out in a single write so two relays sharing a terminal do not
/// split each other's prefixes.
pub async fn relay_stream<R, W>(mut reader: R, label: &str, mut writer: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let prefix = format!("[{label}] ");
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut out = Vec::with_capacity(prefix.len() + CHUNK_SIZE);
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        out.clear();
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(&buf[..n]);
        writer.write_all(&out).await?;
        writer.flush().await?;
        total += n as u64;
    }

    Ok(total)
}

/// Drain `reader`, keeping only the last `max_lines` lines
///
/// Used in quiet mode so a failing tool still leaves a diagnostic trail in the log.
pub async fn tail_lines<R>(reader: R, max_lines: usize) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let mut lines = tokio::io::BufReader::new(reader).split(b'\n');
    let mut tail = VecDeque::with_capacity(max_lines);

    while let Some(raw) = lines.next_segment().await? {
        // yt-dlp redraws progress with carriage returns; keep only the final redraw
        let text = String::from_utf8_lossy(&raw);
        let last = text.rsplit('\r').find(|s| !s.trim().is_empty()).unwrap_or("");
        if last.trim().is_empty() {
            continue;
        }
        if tail.len() == max_lines {
            tail.pop_front();
        }
        tail.push_back(last.trim_end().to_string());
    }

    Ok(tail.into())
}
