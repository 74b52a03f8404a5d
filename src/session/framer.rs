//! Line framing over the session transport
//!
//! Reads CRLF-terminated logical lines and multi-line data blocks with
//! dot-unstuffing; writes single-line and dot-stuffed multi-line replies.
//! After COMPRESS DEFLATE negotiation a raw-deflate codec sits between the
//! framer and the transport in both directions, with a sync flush per reply
//! so the peer never waits on buffered compressed bytes.

use std::time::Duration;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::trace;

use crate::error::{NntpError, Result};

use super::transport::Transport;

/// Read chunk size from the transport
const READ_CHUNK: usize = 8 * 1024;
/// Flush the write buffer to the socket once it grows past this
const WRITE_FLUSH_THRESHOLD: usize = 32 * 1024;
/// Reclaim consumed read-buffer space past this offset
const COMPACT_THRESHOLD: usize = 64 * 1024;

pub(crate) struct Framer {
    transport: Transport,
    /// Decoded (post-inflate) input not yet consumed
    rbuf: Vec<u8>,
    /// Consumed prefix of `rbuf`
    rpos: usize,
    /// Encoded (post-deflate) output not yet written
    wbuf: Vec<u8>,
    inflate: Option<Decompress>,
    deflate: Option<Compress>,
    /// Whether the `.CRLF` terminator goes through the deflate stream too
    compress_terminator: bool,
    max_line: usize,
    write_timeout: Duration,
    bytes_in: u64,
    bytes_out: u64,
}

impl Framer {
    pub(crate) fn new(transport: Transport, max_line: usize, write_timeout: Duration) -> Self {
        Self {
            transport,
            rbuf: Vec::with_capacity(READ_CHUNK),
            rpos: 0,
            wbuf: Vec::with_capacity(READ_CHUNK),
            inflate: None,
            deflate: None,
            compress_terminator: false,
            max_line,
            write_timeout,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Whether TLS is active on the underlying transport
    pub(crate) fn is_tls(&self) -> bool {
        self.transport.is_tls()
    }

    /// Whether DEFLATE is active in either direction
    pub(crate) fn compression_active(&self) -> bool {
        self.deflate.is_some()
    }

    /// Bytes received from the socket
    pub(crate) fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Bytes written to the socket
    pub(crate) fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Whether decoded input is already buffered (pipelined by the client)
    pub(crate) fn has_buffered_input(&self) -> bool {
        self.rpos < self.rbuf.len()
    }

    /// Take the transport back, e.g. for a STARTTLS handshake
    pub(crate) fn into_transport(self) -> Transport {
        self.transport
    }

    /// Switch both directions to raw DEFLATE (RFC 4644 COMPRESS)
    ///
    /// The activating reply must be written before this call; everything
    /// after it is part of the compressed stream.
    pub(crate) fn enable_deflate(&mut self, compress_terminator: bool) {
        self.inflate = Some(Decompress::new(false));
        self.deflate = Some(Compress::new(Compression::default(), false));
        self.compress_terminator = compress_terminator;
    }

    /// Read one logical line, CRLF (or bare LF) stripped
    pub(crate) async fn read_line(&mut self) -> Result<String> {
        let line = self.read_line_bytes(self.max_line).await?;
        let line = String::from_utf8_lossy(&line).into_owned();
        trace!(line = %line, "recv");
        Ok(line)
    }

    /// Read one raw line with an explicit length cap
    async fn read_line_bytes(&mut self, cap: usize) -> Result<Vec<u8>> {
        loop {
            if let Some(offset) = self.rbuf[self.rpos..].iter().position(|&b| b == b'\n') {
                let newline = self.rpos + offset;
                let mut end = newline;
                if end > self.rpos && self.rbuf[end - 1] == b'\r' {
                    end -= 1;
                }
                if end - self.rpos > cap {
                    return Err(NntpError::LineTooLong(cap));
                }
                let line = self.rbuf[self.rpos..end].to_vec();
                self.rpos = newline + 1;
                if self.rpos >= COMPACT_THRESHOLD {
                    self.rbuf.drain(..self.rpos);
                    self.rpos = 0;
                }
                return Ok(line);
            }

            if self.rbuf.len() - self.rpos > cap {
                return Err(NntpError::LineTooLong(cap));
            }
            self.fill().await?;
        }
    }

    /// Read a multi-line data block up to the `.` terminator, dot-unstuffed
    ///
    /// Lines come back CRLF-joined with a trailing CRLF. Per-line length is
    /// not capped here; only the total size is.
    pub(crate) async fn read_data_block(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            let line = self.read_line_bytes(max_bytes).await?;
            if line == b"." {
                break;
            }
            let content: &[u8] = if line.starts_with(b"..") {
                &line[1..]
            } else {
                &line
            };
            data.extend_from_slice(content);
            data.extend_from_slice(b"\r\n");
            if data.len() > max_bytes {
                return Err(NntpError::DataTooLarge(max_bytes));
            }
        }
        trace!(bytes = data.len(), "recv data block");
        Ok(data)
    }

    async fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk).await?;
        if n == 0 {
            return Err(NntpError::ConnectionClosed);
        }
        self.bytes_in += n as u64;
        match &mut self.inflate {
            Some(inflate) => inflate_into(inflate, &chunk[..n], &mut self.rbuf)?,
            None => self.rbuf.extend_from_slice(&chunk[..n]),
        }
        Ok(())
    }

    /// Send a single-line reply: `code SP text CRLF`
    pub(crate) async fn send_line(&mut self, code: u16, text: &str) -> Result<()> {
        trace!(code, text, "send");
        let line = format!("{code} {text}\r\n");
        self.queue(line.as_bytes())?;
        self.finish_deflate_block()?;
        self.flush_to_socket().await
    }

    /// Send a multi-line reply: status line, dot-stuffed payload, `.` terminator
    pub(crate) async fn send_multiline<I>(&mut self, code: u16, text: &str, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        trace!(code, text, "send multi-line");
        let status = format!("{code} {text}\r\n");
        self.queue(status.as_bytes())?;

        for line in lines {
            let line = line.as_ref();
            if line.first() == Some(&b'.') {
                self.queue(b".")?;
            }
            self.queue(line)?;
            self.queue(b"\r\n")?;
            if self.wbuf.len() >= WRITE_FLUSH_THRESHOLD {
                self.flush_to_socket().await?;
            }
        }

        if self.deflate.is_some() && !self.compress_terminator {
            // Close the compressed payload, then write the terminator in
            // the clear on the underlying stream
            self.finish_deflate_block()?;
            self.wbuf.extend_from_slice(b".\r\n");
        } else {
            self.queue(b".\r\n")?;
            self.finish_deflate_block()?;
        }
        self.flush_to_socket().await
    }

    /// Half-close the write side
    pub(crate) async fn shutdown(&mut self) {
        let _ = self.transport.shutdown().await;
    }

    fn queue(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.deflate {
            Some(deflate) => deflate_into(deflate, bytes, &mut self.wbuf),
            None => {
                self.wbuf.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    /// Sync-flush the deflate stream so the peer can decode what we sent
    fn finish_deflate_block(&mut self) -> Result<()> {
        if let Some(deflate) = &mut self.deflate {
            deflate_sync_flush(deflate, &mut self.wbuf)?;
        }
        Ok(())
    }

    async fn flush_to_socket(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.wbuf);
        let deadline = self.write_timeout;
        let transport = &mut self.transport;
        let write = async {
            transport.write_all(&buf).await?;
            transport.flush().await
        };
        timeout(deadline, write)
            .await
            .map_err(|_| NntpError::Timeout)??;
        self.bytes_out += buf.len() as u64;
        Ok(())
    }
}

fn inflate_into(inflate: &mut Decompress, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut consumed = 0;
    while consumed < input.len() {
        if out.capacity() == out.len() {
            out.reserve(READ_CHUNK);
        }
        let before_in = inflate.total_in();
        let before_len = out.len();
        let status = inflate
            .decompress_vec(&input[consumed..], out, FlushDecompress::None)
            .map_err(|e| NntpError::Compression(e.to_string()))?;
        consumed += (inflate.total_in() - before_in) as usize;
        match status {
            Status::StreamEnd => break,
            _ if consumed < input.len()
                && inflate.total_in() == before_in
                && out.len() == before_len =>
            {
                // No progress in either direction: corrupt stream
                return Err(NntpError::Compression(
                    "deflate stream stalled".to_string(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn deflate_into(deflate: &mut Compress, input: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut consumed = 0;
    while consumed < input.len() {
        if out.capacity() == out.len() {
            out.reserve(READ_CHUNK);
        }
        let before_in = deflate.total_in();
        deflate
            .compress_vec(&input[consumed..], out, FlushCompress::None)
            .map_err(|e| NntpError::Compression(e.to_string()))?;
        consumed += (deflate.total_in() - before_in) as usize;
    }
    Ok(())
}

fn deflate_sync_flush(deflate: &mut Compress, out: &mut Vec<u8>) -> Result<()> {
    loop {
        if out.capacity() == out.len() {
            out.reserve(READ_CHUNK);
        }
        let before_len = out.len();
        deflate
            .compress_vec(&[], out, FlushCompress::Sync)
            .map_err(|e| NntpError::Compression(e.to_string()))?;
        // Done once the flush stops producing output and room remains
        if out.len() == before_len && out.len() < out.capacity() {
            return Ok(());
        }
    }
}
