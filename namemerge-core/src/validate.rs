//! Incremental structural validation of the input document.
//!
//! The validator is fed the request body chunk by chunk, before any
//! expensive pipeline work starts. It checks three things, in the order
//! they become decidable:
//!
//! 1. the bytes are syntactically valid JSON;
//! 2. the document is an object whose keys are drawn from
//!    `first_names` / `last_names`, each mapping to an array of
//!    two-element `[name, id]` arrays with a non-empty string name and an
//!    integer id;
//! 3. at least one of the two keys is present (checked at [`finish`]).
//!
//! Internally it is a byte-level tokenizer plus a fixed-depth shape
//! machine. The tokenizer only finds token boundaries - string unescaping
//! and numeric validation are delegated to `serde_json` on the completed
//! token text, so escape and number semantics stay exactly serde's. An
//! incomplete token at a chunk boundary is carried over, never an error;
//! a *completed* element that violates the grammar fails immediately. The
//! rolling state is a few bytes of pending token plus booleans, so memory
//! stays O(longest single token), not O(document).
//!
//! [`finish`]: StreamingValidator::finish

use std::io::Read;
use std::path::Path;

use crate::error::{MergeError, Result};
use crate::record::Side;

const MALFORMED: &str = "malformed JSON input";

/// Lexical token boundary found by the byte scanner.
#[derive(Debug)]
enum Token {
    ObjBegin,
    ObjEnd,
    ArrBegin,
    ArrEnd,
    Colon,
    Comma,
    Str(String),
    Num(serde_json::Number),
    Bool,
    Null,
}

#[derive(Debug)]
enum Mode {
    Idle,
    /// Inside a string literal; `escaped` is true right after a backslash.
    Str { escaped: bool },
    /// Inside a number / `true` / `false` / `null`; ends at a delimiter.
    Scalar,
}

struct Tokenizer {
    pending: Vec<u8>,
    mode: Mode,
    /// Bytes consumed before the current chunk; diagnostics only.
    offset: u64,
}

impl Tokenizer {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            mode: Mode::Idle,
            offset: 0,
        }
    }

    fn push<F>(&mut self, chunk: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(Token) -> Result<()>,
    {
        let mut i = 0usize;
        while i < chunk.len() {
            let b = chunk[i];
            match self.mode {
                Mode::Str { ref mut escaped } => {
                    self.pending.push(b);
                    i += 1;
                    if *escaped {
                        *escaped = false;
                    } else if b == b'\\' {
                        *escaped = true;
                    } else if b == b'"' {
                        let raw = std::mem::take(&mut self.pending);
                        self.mode = Mode::Idle;
                        emit(Token::Str(decode_string(&raw, self.offset + i as u64)?))?;
                    }
                }
                Mode::Scalar => {
                    if is_scalar_byte(b) {
                        self.pending.push(b);
                        i += 1;
                    } else {
                        let raw = std::mem::take(&mut self.pending);
                        self.mode = Mode::Idle;
                        emit(scalar_token(&raw, self.offset + i as u64)?)?;
                        // Reprocess `b` as a fresh token.
                    }
                }
                Mode::Idle => match b {
                    b' ' | b'\t' | b'\n' | b'\r' => i += 1,
                    b'{' => {
                        i += 1;
                        emit(Token::ObjBegin)?;
                    }
                    b'}' => {
                        i += 1;
                        emit(Token::ObjEnd)?;
                    }
                    b'[' => {
                        i += 1;
                        emit(Token::ArrBegin)?;
                    }
                    b']' => {
                        i += 1;
                        emit(Token::ArrEnd)?;
                    }
                    b':' => {
                        i += 1;
                        emit(Token::Colon)?;
                    }
                    b',' => {
                        i += 1;
                        emit(Token::Comma)?;
                    }
                    b'"' => {
                        self.mode = Mode::Str { escaped: false };
                        self.pending.push(b);
                        i += 1;
                    }
                    _ if is_scalar_byte(b) => {
                        self.mode = Mode::Scalar;
                        self.pending.push(b);
                        i += 1;
                    }
                    other => {
                        return Err(malformed(format!(
                            "unexpected byte 0x{:02x} at offset {}",
                            other,
                            self.offset + i as u64
                        )))
                    }
                },
            }
        }
        self.offset += chunk.len() as u64;
        Ok(())
    }

    fn finish<F>(&mut self, mut emit: F) -> Result<()>
    where
        F: FnMut(Token) -> Result<()>,
    {
        match self.mode {
            Mode::Idle => Ok(()),
            Mode::Str { .. } => Err(malformed(format!(
                "unterminated string at end of input (offset {})",
                self.offset
            ))),
            Mode::Scalar => {
                let raw = std::mem::take(&mut self.pending);
                self.mode = Mode::Idle;
                emit(scalar_token(&raw, self.offset)?)
            }
        }
    }
}

fn is_scalar_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.')
}

/// Decode a complete string token (quotes included) through serde_json so
/// escape handling matches everything else in the system.
fn decode_string(raw: &[u8], offset: u64) -> Result<String> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| serde_json::from_str::<String>(s).ok())
        .ok_or_else(|| malformed(format!("invalid string literal ending at offset {offset}")))
}

fn scalar_token(raw: &[u8], offset: u64) -> Result<Token> {
    match raw {
        b"true" | b"false" => Ok(Token::Bool),
        b"null" => Ok(Token::Null),
        _ => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Number>(s).ok())
            .map(Token::Num)
            .ok_or_else(|| malformed(format!("invalid literal ending at offset {offset}"))),
    }
}

fn malformed(detail: String) -> MergeError {
    MergeError::invalid_input(MALFORMED, detail)
}

/// Where in the fixed-depth grammar the next token must fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the opening `{`.
    Start,
    /// Inside the root object: key or `}`.
    KeyOrEnd,
    /// After a comma in the root object: key only.
    KeyOnly,
    /// After a key: `:`.
    Colon,
    /// After `key:`: the side array's `[`.
    SideValue,
    /// Inside a side array: item `[` or `]`.
    ItemOrEnd,
    /// After an item: `,` or `]`.
    ItemSep,
    /// After a comma in a side array: item `[` only.
    ItemOnly,
    /// First item element: the name string.
    ItemName,
    /// Between item elements: `,`.
    ItemNameSep,
    /// Second item element: the integer id.
    ItemId,
    /// After both elements: `]`.
    ItemClose,
    /// After a side array: `,` or `}`.
    PairSep,
    /// Root object closed.
    Done,
}

struct Shape {
    state: State,
    side: Side,
    seen_first: bool,
    seen_last: bool,
}

impl Shape {
    fn new() -> Self {
        Self {
            state: State::Start,
            side: Side::First,
            seen_first: false,
            seen_last: false,
        }
    }

    fn on_token(&mut self, token: Token) -> Result<()> {
        use State::*;

        self.state = match (self.state, token) {
            (Start, Token::ObjBegin) => KeyOrEnd,
            (Start, _) => {
                return Err(MergeError::invalid_input(
                    "top-level value must be a JSON object",
                    "document does not start with '{'".to_string(),
                ))
            }

            (KeyOrEnd, Token::ObjEnd) => Done,
            (KeyOrEnd | KeyOnly, Token::Str(key)) => {
                self.side = match key.as_str() {
                    "first_names" => Side::First,
                    "last_names" => Side::Last,
                    other => {
                        return Err(MergeError::invalid_input(
                            "unexpected top-level key (expected 'first_names' or 'last_names')",
                            format!("top-level key {other:?}"),
                        ))
                    }
                };
                Colon
            }
            (KeyOrEnd | KeyOnly, _) => return Err(malformed("expected object key".to_string())),

            (Colon, Token::Colon) => SideValue,
            (Colon, _) => return Err(malformed("expected ':' after key".to_string())),

            (SideValue, Token::ArrBegin) => {
                match self.side {
                    Side::First => self.seen_first = true,
                    Side::Last => self.seen_last = true,
                }
                ItemOrEnd
            }
            (SideValue, _) => {
                return Err(MergeError::invalid_input(
                    "'first_names' and 'last_names' must be arrays",
                    format!("{} is not an array", self.side.key()),
                ))
            }

            (ItemOrEnd, Token::ArrEnd) => PairSep,
            (ItemOrEnd | ItemOnly, Token::ArrBegin) => ItemName,
            (ItemOrEnd | ItemOnly, Token::Comma | Token::ArrEnd | Token::Colon) => {
                return Err(malformed(format!(
                    "stray punctuation in {} array",
                    self.side.key()
                )))
            }
            (ItemOrEnd | ItemOnly, _) => {
                return Err(MergeError::invalid_input(
                    "array items must be [name, id] pairs",
                    format!("non-array item in {}", self.side.key()),
                ))
            }

            (ItemSep, Token::Comma) => ItemOnly,
            (ItemSep, Token::ArrEnd) => PairSep,
            (ItemSep, _) => {
                return Err(malformed(format!(
                    "expected ',' or ']' in {} array",
                    self.side.key()
                )))
            }

            (ItemName, Token::Str(name)) => {
                if name.is_empty() {
                    return Err(MergeError::invalid_input(
                        "name must be a non-empty string",
                        format!("empty name in {}", self.side.key()),
                    ));
                }
                ItemNameSep
            }
            (ItemName, Token::ArrEnd) => {
                return Err(MergeError::invalid_input(
                    "array items must be exactly two elements",
                    format!("empty item array in {}", self.side.key()),
                ))
            }
            (ItemName, _) => {
                return Err(MergeError::invalid_input(
                    "item name must be a string",
                    format!("non-string first element in {}", self.side.key()),
                ))
            }

            (ItemNameSep, Token::Comma) => ItemId,
            (ItemNameSep, Token::ArrEnd) => {
                return Err(MergeError::invalid_input(
                    "array items must be exactly two elements",
                    format!("one-element item array in {}", self.side.key()),
                ))
            }
            (ItemNameSep, _) => {
                return Err(malformed("expected ',' between item elements".to_string()))
            }

            (ItemId, Token::Num(n)) => {
                if n.as_i64().is_none() {
                    return Err(MergeError::invalid_input(
                        "id must be an integer",
                        format!("non-integer id {n} in {}", self.side.key()),
                    ));
                }
                ItemClose
            }
            (ItemId, Token::ArrEnd) => {
                return Err(MergeError::invalid_input(
                    "array items must be exactly two elements",
                    format!("one-element item array in {}", self.side.key()),
                ))
            }
            (ItemId, _) => {
                return Err(MergeError::invalid_input(
                    "item id must be an integer",
                    format!("non-number second element in {}", self.side.key()),
                ))
            }

            (ItemClose, Token::ArrEnd) => ItemSep,
            (ItemClose, Token::Comma) => {
                return Err(MergeError::invalid_input(
                    "array items must be exactly two elements",
                    format!("item array with more than two elements in {}", self.side.key()),
                ))
            }
            (ItemClose, _) => return Err(malformed("expected ']' after item id".to_string())),

            (PairSep, Token::Comma) => KeyOnly,
            (PairSep, Token::ObjEnd) => Done,
            (PairSep, _) => {
                return Err(malformed("expected ',' or '}' after array".to_string()))
            }

            (Done, _) => {
                return Err(malformed("unexpected data after document end".to_string()))
            }
        };
        Ok(())
    }
}

/// Push-fed validator over the accepted document grammar.
///
/// Feed body chunks with [`feed`](Self::feed) as they arrive, then call
/// [`finish`](Self::finish) once the body is complete. The first error is
/// final; callers should stop feeding after one.
pub struct StreamingValidator {
    tokenizer: Tokenizer,
    shape: Shape,
}

impl StreamingValidator {
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            shape: Shape::new(),
        }
    }

    /// Consume the next slice of the document. Incomplete trailing tokens
    /// are buffered, not errors; completed non-conforming elements fail
    /// here and now.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        let shape = &mut self.shape;
        self.tokenizer.push(chunk, |token| shape.on_token(token))
    }

    /// Flush any buffered tail and check whole-document requirements.
    pub fn finish(mut self) -> Result<()> {
        let shape = &mut self.shape;
        self.tokenizer.finish(|token| shape.on_token(token))?;

        if self.shape.state != State::Done {
            return Err(malformed("unexpected end of input".to_string()));
        }
        if !self.shape.seen_first && !self.shape.seen_last {
            return Err(MergeError::invalid_input(
                "input must contain at least one of 'first_names' or 'last_names'",
                "document closed with neither side present".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamingValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a reader in bounded chunks; used by the CLI path and anywhere
/// the document is already on disk.
pub fn validate_reader(mut reader: impl Read) -> Result<()> {
    let mut validator = StreamingValidator::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        validator.feed(&buf[..n])?;
    }
    validator.finish()
}

/// Validate a file on disk.
pub fn validate_file(path: &Path) -> Result<()> {
    validate_reader(std::fs::File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_bytes(input: &[u8]) -> Result<()> {
        let mut v = StreamingValidator::new();
        v.feed(input)?;
        v.finish()
    }

    /// Same input, one byte per feed - chunk boundaries must not matter.
    fn validate_byte_at_a_time(input: &[u8]) -> Result<()> {
        let mut v = StreamingValidator::new();
        for b in input {
            v.feed(std::slice::from_ref(b))?;
        }
        v.finish()
    }

    #[test]
    fn accepts_well_formed_document() {
        let doc = br#"{"first_names":[["Alice",1],["Bob",2]],"last_names":[["Smith",1]]}"#;
        validate_bytes(doc).unwrap();
        validate_byte_at_a_time(doc).unwrap();
    }

    #[test]
    fn accepts_single_side_and_empty_arrays() {
        validate_bytes(br#"{"first_names":[]}"#).unwrap();
        validate_bytes(br#"{"last_names":[["Smith",2]]}"#).unwrap();
        validate_bytes(br#"{"first_names":[],"last_names":[]}"#).unwrap();
    }

    #[test]
    fn accepts_whitespace_between_every_token() {
        let doc = b" { \"first_names\" : [ [ \"A\" , 1 ] , [ \"B\" , 2 ] ] } ";
        validate_bytes(doc).unwrap();
        validate_byte_at_a_time(doc).unwrap();
    }

    #[test]
    fn rejects_missing_both_keys() {
        let err = validate_bytes(br#"{}"#).unwrap_err();
        assert!(err.client_message().contains("at least one"));

        let err = validate_bytes(br#"{"other":[]}"#).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn rejects_truncated_document() {
        let err = validate_bytes(br#"{"first_names":[["A",1]"#).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn rejects_non_object_root() {
        assert!(validate_bytes(br#"[["A",1]]"#).is_err());
        assert!(validate_bytes(b"42").is_err());
    }

    #[test]
    fn rejects_wrong_item_arity_as_soon_as_complete() {
        // Arity error is raised while feeding, before finish().
        let mut v = StreamingValidator::new();
        let err = v.feed(br#"{"first_names":[["A",1,2]"#).unwrap_err();
        assert!(err.client_message().contains("two elements"));

        let mut v = StreamingValidator::new();
        let err = v.feed(br#"{"first_names":[["A"]"#).unwrap_err();
        assert!(err.client_message().contains("two elements"));
    }

    #[test]
    fn rejects_wrong_element_types() {
        assert!(validate_bytes(br#"{"first_names":[[1,"A"]]}"#).is_err());
        assert!(validate_bytes(br#"{"first_names":[["A","1"]]}"#).is_err());
        assert!(validate_bytes(br#"{"first_names":[[true,1]]}"#).is_err());
        assert!(validate_bytes(br#"{"first_names":[null]}"#).is_err());
        assert!(validate_bytes(br#"{"first_names":[{"name":"A"}]}"#).is_err());
    }

    #[test]
    fn rejects_non_integer_ids() {
        let err = validate_bytes(br#"{"first_names":[["A",1.5]]}"#).unwrap_err();
        assert!(err.client_message().contains("integer"));
        assert!(validate_bytes(br#"{"first_names":[["A",1e3]]}"#).is_err());
        // u64-range but beyond i64
        assert!(validate_bytes(br#"{"first_names":[["A",9223372036854775808]]}"#).is_err());
    }

    #[test]
    fn accepts_i64_boundary_ids() {
        validate_bytes(br#"{"first_names":[["A",9223372036854775807]]}"#).unwrap();
        validate_bytes(br#"{"first_names":[["A",-9223372036854775808]]}"#).unwrap();
    }

    #[test]
    fn rejects_empty_name() {
        let err = validate_bytes(br#"{"first_names":[["",1]]}"#).unwrap_err();
        assert!(err.client_message().contains("non-empty"));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(validate_bytes(br#"{"first_names":[]} extra"#).is_err());
        assert!(validate_bytes(b"{\"first_names\":[]}{}").is_err());
    }

    #[test]
    fn accepts_escaped_and_unicode_names() {
        validate_bytes("{\"first_names\":[[\"a\\\"b\\\\c\",1],[\"Ærø\",2]]}".as_bytes()).unwrap();
        validate_bytes("{\"first_names\":[[\"花子\",1]]}".as_bytes()).unwrap();
    }

    #[test]
    fn token_split_across_chunks_is_not_an_error() {
        let mut v = StreamingValidator::new();
        v.feed(br#"{"first_na"#).unwrap();
        v.feed(br#"mes":[["Ali"#).unwrap();
        v.feed(br#"ce",12"#).unwrap();
        v.feed(br#"34]]}"#).unwrap();
        v.finish().unwrap();
    }

    #[test]
    fn rejects_malformed_punctuation() {
        assert!(validate_bytes(br#"{"first_names":[["A",1],]}"#).is_err());
        assert!(validate_bytes(br#"{"first_names" [["A",1]]}"#).is_err());
        assert!(validate_bytes(br#"{"first_names":[["A" 1]]}"#).is_err());
    }

    #[test]
    fn reader_helper_matches_push_api() {
        let doc = br#"{"last_names":[["Smith",1]]}"#;
        validate_reader(&doc[..]).unwrap();
        assert!(validate_reader(&br#"{"last_names":"#[..]).is_err());
    }
}
