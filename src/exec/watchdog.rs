//! Per-line inactivity watchdog over a subprocess stream.
//!
//! [`WatchdogReader`] reads delimiter-separated chunks from one stream and
//! enforces an inactivity timeout per chunk: the timer covers the wait for
//! the *next* line only, so a process that keeps emitting lines can run far
//! longer than the timeout without tripping it. The caller sees each line
//! before the timer is re-armed for the next read.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::{Error, Result};

/// A line read from the monitored stream, or end of stream.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// One chunk, delimiter included, lossily decoded to UTF-8.
    Line(String),
    /// The stream reached EOF.
    Eof,
}

/// Wraps one stream and yields lines under an inactivity timeout.
pub struct WatchdogReader<R> {
    reader: BufReader<R>,
    timeout: Duration,
    separator: u8,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> WatchdogReader<R> {
    /// Create a reader with the given per-line timeout and line delimiter.
    pub fn new(stream: R, timeout: Duration, separator: u8) -> Self {
        Self {
            reader: BufReader::new(stream),
            timeout,
            separator,
            buf: Vec::new(),
        }
    }

    /// Read the next delimiter-terminated chunk.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessHung`] if no data arrives within the timeout, or
    /// [`Error::Io`] if the underlying read fails. The caller is responsible
    /// for killing the process on a hang; this type only observes the stream.
    pub async fn next_line(&mut self) -> Result<LineEvent> {
        self.buf.clear();
        let read = tokio::time::timeout(
            self.timeout,
            self.reader.read_until(self.separator, &mut self.buf),
        );

        match read.await {
            Err(_elapsed) => Err(Error::ProcessHung {
                timeout: self.timeout,
            }),
            Ok(Ok(0)) => Ok(LineEvent::Eof),
            Ok(Ok(_n)) => Ok(LineEvent::Line(
                String::from_utf8_lossy(&self.buf).into_owned(),
            )),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_lines_then_eof() {
        let data: &[u8] = b"abc\ndef\n";
        let mut wd = WatchdogReader::new(data, Duration::from_secs(1), b'\n');
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Line("abc\n".into()));
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Line("def\n".into()));
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Eof);
    }

    #[tokio::test]
    async fn final_chunk_without_delimiter_is_yielded() {
        let data: &[u8] = b"abc\ntail";
        let mut wd = WatchdogReader::new(data, Duration::from_secs(1), b'\n');
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Line("abc\n".into()));
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Line("tail".into()));
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Eof);
    }

    #[tokio::test]
    async fn carriage_return_separator() {
        let data: &[u8] = b"p1\rp2\r";
        let mut wd = WatchdogReader::new(data, Duration::from_secs(1), b'\r');
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Line("p1\r".into()));
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Line("p2\r".into()));
        assert_eq!(wd.next_line().await.unwrap(), LineEvent::Eof);
    }

    #[tokio::test]
    async fn silence_trips_the_timeout() {
        // A duplex pipe with nothing written: the read blocks until the
        // watchdog fires.
        let (_tx, rx) = tokio::io::duplex(64);
        let mut wd = WatchdogReader::new(rx, Duration::from_millis(50), b'\n');
        match wd.next_line().await {
            Err(Error::ProcessHung { .. }) => {}
            other => panic!("expected ProcessHung, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn steady_lines_never_trip_even_past_total_timeout() {
        use tokio::io::AsyncWriteExt;

        let (mut tx, rx) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            // Five lines, each inside the window; total run ~5x the timeout.
            for i in 0..5u8 {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tx.write_all(format!("line{i}\n").as_bytes()).await.unwrap();
            }
        });

        let mut wd = WatchdogReader::new(rx, Duration::from_millis(120), b'\n');
        let mut lines = 0;
        loop {
            match wd.next_line().await.unwrap() {
                LineEvent::Line(_) => lines += 1,
                LineEvent::Eof => break,
            }
        }
        writer.await.unwrap();
        assert_eq!(lines, 5);
    }
}
