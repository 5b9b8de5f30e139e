//! NDJSON readers and writers for the intermediate record streams.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::record::NameRecord;

/// Line-at-a-time reader over an intermediate. Empty lines are skipped;
/// anything else must parse as a record.
pub struct RecordReader<R: BufRead> {
    reader: R,
    line: String,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }

    /// The next record, `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<NameRecord>> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return NameRecord::from_line(trimmed).map(Some);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<NameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Buffered record writer; call [`finish`](Self::finish) before handing the
/// file to a reader.
pub struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
}

impl RecordWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    pub fn write_record(&mut self, record: &NameRecord) -> Result<()> {
        self.writer.write_all(record.to_line().as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
