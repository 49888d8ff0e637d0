//! Whitespace tokenizer that turns an input stream into jobs.
//!
//! Tokens are separated by any whitespace, newlines included, and consumed in
//! pairs: URL first, destination path second. There is no quoting, so neither
//! value can contain whitespace.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::job::{Job, JobId};

pub struct JobReader<R> {
    input: R,
    /// URL read without a following path; only left set at end of input.
    pending_url: Option<String>,
    next_id: JobId,
    eof: bool,
}

impl<R: AsyncBufRead + Unpin> JobReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            pending_url: None,
            next_id: 1,
            eof: false,
        }
    }

    /// Next complete (URL, path) pair, or `None` once input is exhausted.
    /// Returns as soon as the path token is terminated by whitespace, without
    /// waiting for the end of the line.
    /// I/O errors and invalid UTF-8 are returned as-is; the reader should not be
    /// polled again after an error.
    pub async fn next_job(&mut self) -> io::Result<Option<Job>> {
        let url = match self.pending_url.take() {
            Some(url) => url,
            None => match self.next_token().await? {
                Some(url) => url,
                None => return Ok(None),
            },
        };
        let Some(path) = self.next_token().await? else {
            self.pending_url = Some(url);
            return Ok(None);
        };
        let job = Job::new(self.next_id, url, path);
        self.next_id += 1;
        Ok(Some(job))
    }

    /// Reads one token, skipping leading whitespace. The token ends at the
    /// first whitespace byte after it (which is consumed) or at end of input.
    async fn next_token(&mut self) -> io::Result<Option<String>> {
        let mut token = Vec::new();
        while !self.eof {
            let buf = self.input.fill_buf().await?;
            if buf.is_empty() {
                self.eof = true;
                break;
            }
            let mut used = 0;
            let mut complete = false;
            for &b in buf {
                used += 1;
                if is_separator(b) {
                    if !token.is_empty() {
                        complete = true;
                        break;
                    }
                } else {
                    token.push(b);
                }
            }
            self.input.consume(used);
            if complete {
                break;
            }
        }
        if token.is_empty() {
            return Ok(None);
        }
        String::from_utf8(token)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// A lone URL left over at end of input (no path followed it).
    pub fn dangling_token(&self) -> Option<&str> {
        if self.eof {
            self.pending_url.as_deref()
        } else {
            None
        }
    }

    /// Number of jobs produced so far.
    pub fn jobs_read(&self) -> u64 {
        self.next_id - 1
    }
}

fn is_separator(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}
