//! Envelope emitter: frames the staged merge output as one JSON object.
//!
//! ```text
//! {"full_names":[ …paired… ],"unpaired":[ …unpaired… ]}
//! ```
//!
//! Each staged file holds one JSON object per line; the emitter replays it
//! as array elements with comma interposition, batched `emit_batch` lines
//! per chunk. The paired section is always complete before the first
//! unpaired byte.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

/// Replays one staged NDJSON file as a JSON array section.
pub struct SectionEmitter {
    reader: BufReader<File>,
    prefix: &'static str,
    suffix: &'static str,
    emit_batch: usize,
    wrote_element: bool,
    opened: bool,
    closed: bool,
    line: String,
}

impl SectionEmitter {
    /// `prefix` opens the section (e.g. `{"full_names":[`), `suffix` closes
    /// it (`]` or `]}`); both are emitted exactly once.
    pub fn open(
        path: &Path,
        prefix: &'static str,
        suffix: &'static str,
        emit_batch: usize,
    ) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            prefix,
            suffix,
            emit_batch,
            wrote_element: false,
            opened: false,
            closed: false,
            line: String::new(),
        })
    }

    /// Next batch of section bytes, `None` once the suffix has gone out.
    pub fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        if self.closed {
            return None;
        }
        match self.fill_chunk() {
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => {
                self.closed = true;
                Some(Err(e))
            }
        }
    }

    fn fill_chunk(&mut self) -> Result<Vec<u8>> {
        let mut chunk = Vec::new();
        if !self.opened {
            self.opened = true;
            chunk.extend_from_slice(self.prefix.as_bytes());
        }

        let mut lines = 0usize;
        while lines < self.emit_batch {
            if self.next_line()? {
                if self.wrote_element {
                    chunk.push(b',');
                }
                self.wrote_element = true;
                chunk.extend_from_slice(self.line.trim().as_bytes());
                lines += 1;
            } else {
                self.closed = true;
                chunk.extend_from_slice(self.suffix.as_bytes());
                break;
            }
        }
        Ok(chunk)
    }

    /// Fill `self.line` with the next non-empty line; false at EOF.
    fn next_line(&mut self) -> Result<bool> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return Ok(false),
                Ok(_) => {
                    if self.line.trim().is_empty() {
                        continue;
                    }
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
