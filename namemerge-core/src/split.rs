//! Splitter: persisted input document → per-side NDJSON intermediates.
//!
//! The input tempfile is re-read once per side with a manual, element-at-a-time
//! walk of the JSON structure: the root object's keys are scanned, non-target
//! values are skipped byte-wise without buffering, and the target array's
//! elements are pulled one `RawValue` at a time. `serde_json`'s
//! `StreamDeserializer` cannot be used here - pointed at `[...]` it buffers
//! the whole array before yielding, which defeats the memory bound. At any
//! moment only one record is resident, regardless of document size.
//!
//! While writing the intermediate, the splitter hands the same bytes back to
//! its caller in batches of `emit_batch` lines. Those chunks reach the client
//! as a liveness signal during slow inputs; they carry no correctness weight.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{MergeError, Result};
use crate::record::{NameRecord, Side};

/// Streams one side's items out of the input document into an NDJSON file.
pub struct SideSplit {
    reader: BufReader<File>,
    writer: BufWriter<File>,
    side: Side,
    emit_batch: usize,
    state: SideState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideState {
    /// Walking root-object keys looking for this side's array.
    Seeking,
    /// Positioned just past `[`, before the first element.
    FirstElement,
    /// Between elements; a `,` or `]` comes next.
    NextElement,
    /// Array done (or key absent) and the intermediate flushed.
    Finished,
}

impl SideSplit {
    /// Open the input for one side, writing the intermediate to `out_path`.
    /// An absent key yields an empty intermediate, not an error.
    pub fn open(input: &Path, out_path: &Path, side: Side, emit_batch: usize) -> Result<Self> {
        let reader = BufReader::new(File::open(input)?);
        let writer = BufWriter::new(File::create(out_path)?);
        Ok(Self {
            reader,
            writer,
            side,
            emit_batch,
            state: SideState::Seeking,
        })
    }

    /// Produce the next batch of intermediate lines, or `None` once the side
    /// is exhausted. After an error the split is finished.
    pub fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        if self.state == SideState::Finished {
            return None;
        }
        match self.fill_batch() {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => {
                self.state = SideState::Finished;
                Some(Err(e))
            }
        }
    }

    fn fill_batch(&mut self) -> Result<Vec<u8>> {
        let mut chunk = Vec::new();
        let mut lines = 0usize;

        if self.state == SideState::Seeking {
            self.seek_to_array()?;
        }

        while lines < self.emit_batch && self.state != SideState::Finished {
            match self.next_record()? {
                Some(record) => {
                    let mut line = record.to_line();
                    line.push('\n');
                    self.writer.write_all(line.as_bytes())?;
                    chunk.extend_from_slice(line.as_bytes());
                    lines += 1;
                }
                None => {
                    self.state = SideState::Finished;
                    self.writer.flush()?;
                }
            }
        }
        Ok(chunk)
    }

    /// Walk the root object until this side's array opens. Keys the splitter
    /// does not care about are skipped structurally; rejecting them happened
    /// upstream in the validator.
    fn seek_to_array(&mut self) -> Result<()> {
        skip_whitespace(&mut self.reader)?;
        expect_byte(&mut self.reader, b'{')?;

        loop {
            skip_whitespace(&mut self.reader)?;
            match peek_byte(&mut self.reader)? {
                Some(b'}') => {
                    // Key absent: legal as long as the other side exists,
                    // which the validator already established.
                    consume_byte(&mut self.reader)?;
                    self.state = SideState::Finished;
                    self.writer.flush()?;
                    return Ok(());
                }
                Some(b'"') => {}
                other => return Err(structural(format!("expected object key, got {other:?}"))),
            }

            let key = String::deserialize(&mut serde_json::Deserializer::from_reader(
                &mut self.reader,
            ))
            .map_err(|e| structural(format!("bad object key: {e}")))?;

            skip_whitespace(&mut self.reader)?;
            expect_byte(&mut self.reader, b':')?;
            skip_whitespace(&mut self.reader)?;

            if key == self.side.key() {
                expect_byte(&mut self.reader, b'[')?;
                self.state = SideState::FirstElement;
                return Ok(());
            }

            skip_value(&mut self.reader)?;
            skip_whitespace(&mut self.reader)?;
            match peek_byte(&mut self.reader)? {
                Some(b',') => {
                    consume_byte(&mut self.reader)?;
                }
                Some(b'}') => {
                    consume_byte(&mut self.reader)?;
                    self.state = SideState::Finished;
                    self.writer.flush()?;
                    return Ok(());
                }
                other => {
                    return Err(structural(format!(
                        "expected ',' or '}}' after value, got {other:?}"
                    )))
                }
            }
        }
    }

    /// Pull one element off the array, `None` at `]`.
    fn next_record(&mut self) -> Result<Option<NameRecord>> {
        match self.state {
            SideState::FirstElement => {
                skip_whitespace(&mut self.reader)?;
                if peek_byte(&mut self.reader)? == Some(b']') {
                    consume_byte(&mut self.reader)?;
                    return Ok(None);
                }
            }
            SideState::NextElement => {
                skip_whitespace(&mut self.reader)?;
                match peek_byte(&mut self.reader)? {
                    Some(b']') => {
                        consume_byte(&mut self.reader)?;
                        return Ok(None);
                    }
                    Some(b',') => {
                        consume_byte(&mut self.reader)?;
                        skip_whitespace(&mut self.reader)?;
                    }
                    None => return Err(structural("unexpected EOF in array".to_string())),
                    Some(other) => {
                        return Err(structural(format!(
                            "unexpected byte {:?} in array (expected ',' or ']')",
                            char::from(other)
                        )))
                    }
                }
            }
            SideState::Seeking | SideState::Finished => unreachable!("array not open"),
        }

        // One element at a time via RawValue; item arrays self-terminate at
        // their ']' so no delimiter lookahead is consumed.
        let raw = Box::<RawValue>::deserialize(&mut serde_json::Deserializer::from_reader(
            &mut self.reader,
        ))
        .map_err(|e| structural(format!("bad array element: {e}")))?;

        let (name, id): (String, i64) = serde_json::from_str(raw.get())
            .map_err(|e| structural(format!("element is not [string, int]: {e}")))?;
        if name.is_empty() {
            return Err(MergeError::invalid_input(
                "name must be a non-empty string",
                format!("empty name in {}", self.side.key()),
            ));
        }

        self.state = SideState::NextElement;
        Ok(Some(NameRecord { name, id }))
    }
}

/// The persisted bytes were admitted by the validator, so a structural
/// failure here means they changed underneath us or the validator has a
/// hole. Still reported as invalid input, not a crash.
fn structural(detail: String) -> MergeError {
    MergeError::invalid_input("malformed JSON input", detail)
}

fn skip_whitespace(reader: &mut BufReader<File>) -> Result<()> {
    loop {
        match reader.fill_buf() {
            Ok([]) => break,
            Ok(available) => {
                if available[0].is_ascii_whitespace() {
                    reader.consume(1);
                } else {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn peek_byte(reader: &mut BufReader<File>) -> Result<Option<u8>> {
    loop {
        match reader.fill_buf() {
            Ok([]) => return Ok(None),
            Ok(buf) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn consume_byte(reader: &mut BufReader<File>) -> Result<()> {
    reader.consume(1);
    Ok(())
}

fn expect_byte(reader: &mut BufReader<File>, expected: u8) -> Result<()> {
    match peek_byte(reader)? {
        Some(b) if b == expected => {
            reader.consume(1);
            Ok(())
        }
        other => Err(structural(format!(
            "expected {:?}, got {other:?}",
            char::from(expected)
        ))),
    }
}

/// Skip one JSON value without materialising it: strings byte-wise with
/// escape tracking, containers by depth counting, scalars to the next
/// delimiter. Memory stays O(1) even for a skipped multi-gigabyte array.
fn skip_value(reader: &mut BufReader<File>) -> Result<()> {
    skip_whitespace(reader)?;
    match peek_byte(reader)? {
        Some(b'"') => skip_string(reader),
        Some(b'[') | Some(b'{') => skip_container(reader),
        Some(_) => skip_scalar(reader),
        None => Err(structural("unexpected EOF, expected a value".to_string())),
    }
}

fn skip_string(reader: &mut BufReader<File>) -> Result<()> {
    consume_byte(reader)?; // opening quote
    let mut escaped = false;
    loop {
        match peek_byte(reader)? {
            Some(b) => {
                consume_byte(reader)?;
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    return Ok(());
                }
            }
            None => return Err(structural("unterminated string".to_string())),
        }
    }
}

fn skip_container(reader: &mut BufReader<File>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match peek_byte(reader)? {
            Some(b'"') => skip_string(reader)?,
            Some(b'[') | Some(b'{') => {
                consume_byte(reader)?;
                depth += 1;
            }
            Some(b']') | Some(b'}') => {
                consume_byte(reader)?;
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Some(_) => consume_byte(reader)?,
            None => return Err(structural("unterminated container".to_string())),
        }
    }
}

fn skip_scalar(reader: &mut BufReader<File>) -> Result<()> {
    loop {
        match peek_byte(reader)? {
            Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.') => {
                consume_byte(reader)?;
            }
            _ => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn split_side(doc: &str, side: Side, emit_batch: usize) -> (Vec<String>, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.json");
        std::fs::write(&input, doc).unwrap();
        let out = dir.path().join(format!("{}.ndjson", side.stem()));

        let mut split = SideSplit::open(&input, &out, side, emit_batch).unwrap();
        let mut echoed = Vec::new();
        while let Some(chunk) = split.next_chunk() {
            echoed.extend_from_slice(&chunk.unwrap());
        }
        let lines = std::fs::read_to_string(&out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        (lines, echoed)
    }

    #[test]
    fn splits_target_side_only() {
        let doc = r#"{"first_names":[["Alice",1],["Bob",2]],"last_names":[["Smith",1]]}"#;
        let (lines, _) = split_side(doc, Side::First, 100);
        assert_eq!(lines, vec![r#"["Alice",1]"#, r#"["Bob",2]"#]);

        let (lines, _) = split_side(doc, Side::Last, 100);
        assert_eq!(lines, vec![r#"["Smith",1]"#]);
    }

    #[test]
    fn echoed_bytes_match_intermediate() {
        let doc = r#"{"first_names":[["Alice",1],["Bob",2],["Cara",3]]}"#;
        let (lines, echoed) = split_side(doc, Side::First, 2);
        assert_eq!(
            String::from_utf8(echoed).unwrap(),
            lines.join("\n") + "\n"
        );
    }

    #[test]
    fn absent_key_yields_empty_intermediate() {
        let doc = r#"{"first_names":[["Alice",1]]}"#;
        let (lines, echoed) = split_side(doc, Side::Last, 100);
        assert!(lines.is_empty());
        assert!(echoed.is_empty());
    }

    #[test]
    fn empty_array_yields_empty_intermediate() {
        let (lines, _) = split_side(r#"{"first_names":[]}"#, Side::First, 100);
        assert!(lines.is_empty());
    }

    #[test]
    fn skips_over_the_other_side_without_parsing_it() {
        // last_names comes first in the document; splitting for first_names
        // must hop over it structurally.
        let doc = r#"{"last_names":[["Smith",1],["Jones",2]],"first_names":[["Alice",1]]}"#;
        let (lines, _) = split_side(doc, Side::First, 100);
        assert_eq!(lines, vec![r#"["Alice",1]"#]);
    }

    #[test]
    fn tolerates_whitespace_everywhere() {
        let doc = "  { \"first_names\" : [ [ \"Alice\" , 1 ] , [ \"Bob\" , 2 ] ] }  ";
        let (lines, _) = split_side(doc, Side::First, 100);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn rewrites_records_in_compact_form() {
        let doc = r#"{"first_names":[[ "Alice" ,  1 ]]}"#;
        let (lines, _) = split_side(doc, Side::First, 100);
        assert_eq!(lines, vec![r#"["Alice",1]"#]);
    }

    #[test]
    fn bad_element_shape_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.json");
        let mut f = File::create(&input).unwrap();
        // Slipped past hypothetical validation: 3-element item.
        write!(f, r#"{{"first_names":[["Alice",1,2]]}}"#).unwrap();
        drop(f);

        let out = dir.path().join("first.ndjson");
        let mut split = SideSplit::open(&input, &out, Side::First, 100).unwrap();
        let err = split.next_chunk().unwrap().unwrap_err();
        assert!(err.is_client_error());
        // Finished after the error
        assert!(split.next_chunk().is_none());
    }

    #[test]
    fn unicode_names_pass_through() {
        let doc = r#"{"first_names":[["花子",1],["Ærø",2]]}"#;
        let (lines, _) = split_side(doc, Side::First, 100);
        assert_eq!(NameRecord::from_line(&lines[0]).unwrap().name, "花子");
        assert_eq!(NameRecord::from_line(&lines[1]).unwrap().name, "Ærø");
    }
}
