use std::collections::VecDeque;

use serde::de::DeserializeOwned;

use crate::errors::TransportError;
use crate::events::Event;

// same as serde_json::from_slice, but handles empty data correctly
pub fn deserialize<T: DeserializeOwned>(mut data: &[u8]) -> Result<T, serde_json::Error> {
    if data.is_empty() {
        // an event without data lines decodes the same as `null`
        data = b"null";
    }

    serde_json::from_slice(data)
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are fed as they arrive from the transport and parsed into lines
/// right away; complete events are taken out with
/// [`EventDecoder::next_event`]. A single event, including the line still
/// being received, may not grow past `max_size` bytes.
#[derive(Debug)]
pub(crate) struct EventDecoder {
    max_size: usize,
    log_target: String,
    buf: Vec<u8>,
    // previous chunk ended with '\r', a leading '\n' belongs to that line
    skip_lf: bool,
    ready: VecDeque<Event>,
    event: Event,
    // raw bytes of the lines accumulated in `event`
    event_size: usize,
    has_data: bool,
}

impl EventDecoder {
    pub(crate) fn new(max_size: usize, log_target: &str) -> Self {
        EventDecoder {
            max_size,
            log_target: log_target.into(),
            buf: Vec::new(),
            skip_lf: false,
            ready: VecDeque::new(),
            event: Event::default(),
            event_size: 0,
            has_data: false,
        }
    }

    /// Parses `chunk`, queueing every event it completes.
    ///
    /// Events completed before an oversized one stay available from
    /// [`EventDecoder::next_event`].
    pub(crate) fn feed(&mut self, mut chunk: &[u8]) -> Result<(), TransportError> {
        if self.skip_lf {
            if let Some(rest) = chunk.strip_prefix(b"\n") {
                chunk = rest;
            }
            self.skip_lf = chunk.is_empty();
        }

        self.buf.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(pos) = self.buf[start..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            let pos = start + pos;
            let mut end = pos + 1;
            if self.buf[pos] == b'\r' {
                match self.buf.get(end) {
                    Some(b'\n') => end += 1,
                    Some(_) => {}
                    // "\r\n" may be split between chunks
                    None => self.skip_lf = true,
                }
            }

            let line = self.buf[start..pos].to_vec();
            start = end;
            if let Err(err) = self.process_line(&line, end - pos) {
                self.buf.clear();
                return Err(err);
            }
        }
        self.buf.drain(..start);

        // incomplete line counts towards the event it belongs to
        if self.event_size + self.buf.len() > self.max_size {
            return Err(self.too_large());
        }
        Ok(())
    }

    /// Returns the next complete event, if one was decoded.
    pub(crate) fn next_event(&mut self) -> Option<Event> {
        self.ready.pop_front()
    }

    fn too_large(&self) -> TransportError {
        TransportError::FrameTooLarge {
            limit: self.max_size,
        }
    }

    /// `eol_len` is the length of the line terminator.
    fn process_line(&mut self, line: &[u8], eol_len: usize) -> Result<(), TransportError> {
        if line.is_empty() {
            self.dispatch();
            return Ok(());
        }

        self.event_size += line.len() + eol_len;
        if self.event_size > self.max_size {
            return Err(self.too_large());
        }

        if line.starts_with(b":") {
            log::trace!(target: self.log_target.as_str(), "<-- comment");
            return Ok(());
        }

        let (field, value) = match line.iter().position(|b| *b == b':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };

        match field {
            b"data" => {
                if self.has_data {
                    self.event.data.push(b'\n');
                }
                self.event.data.extend_from_slice(value);
                self.has_data = true;
            }
            b"event" => {
                self.event.event = Some(String::from_utf8_lossy(value).into_owned());
            }
            b"id" => {
                // ids containing NUL are ignored
                if !value.contains(&0) {
                    self.event.id = Some(String::from_utf8_lossy(value).into_owned());
                }
            }
            b"retry" => {
                if let Some(retry) = std::str::from_utf8(value).ok().and_then(|v| v.parse().ok()) {
                    self.event.retry = Some(retry);
                }
            }
            _ => {
                log::trace!(
                    target: self.log_target.as_str(),
                    "<-- unknown field {}",
                    String::from_utf8_lossy(field)
                );
            }
        }
        Ok(())
    }

    fn dispatch(&mut self) {
        let event = std::mem::take(&mut self.event);
        self.event_size = 0;
        self.has_data = false;
        if event.has_content() {
            self.ready.push_back(event);
        }
    }
}
