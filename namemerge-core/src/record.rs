//! Record types crossing the pipeline stages.
//!
//! On the intermediate NDJSON files a record is the two-element array
//! `["Alice",17]` - the same shape the input document uses. Inside the
//! pipeline it is always the named [`NameRecord`] pair; the positional
//! form exists only at the wire format.

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};

/// One tagged name: `(name, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub name: String,
    pub id: i64,
}

impl NameRecord {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Parse an intermediate line. Rejects anything but `[string, i64]`
    /// with a non-empty name.
    pub fn from_line(line: &str) -> Result<Self> {
        let (name, id): (String, i64) = serde_json::from_str(line).map_err(|e| {
            MergeError::invalid_input(
                "malformed record in intermediate stream",
                format!("line {:?}: {}", truncate_for_log(line), e),
            )
        })?;
        if name.is_empty() {
            return Err(MergeError::invalid_input(
                "name must be a non-empty string",
                "empty name in intermediate stream".to_string(),
            ));
        }
        Ok(Self { name, id })
    }

    /// Compact single-line wire form, no trailing newline.
    pub fn to_line(&self) -> String {
        // (String, i64) serializes as the two-element array form.
        serde_json::to_string(&(&self.name, self.id)).expect("name record serializes")
    }
}

/// A first/last pair that matched on `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedRecord {
    pub first: String,
    pub last: String,
    pub id: i64,
}

/// A record whose `id` had no counterpart on the opposite side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnpairedRecord {
    First { first: String, id: i64 },
    Last { last: String, id: i64 },
}

impl UnpairedRecord {
    pub fn id(&self) -> i64 {
        match self {
            Self::First { id, .. } | Self::Last { id, .. } => *id,
        }
    }
}

/// Which input list a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Last,
}

impl Side {
    /// The top-level key this side is parsed from.
    pub fn key(self) -> &'static str {
        match self {
            Self::First => "first_names",
            Self::Last => "last_names",
        }
    }

    /// File stem used for this side's workspace artifacts.
    pub fn stem(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
        }
    }

    pub fn unpaired(self, record: NameRecord) -> UnpairedRecord {
        match self {
            Self::First => UnpairedRecord::First {
                first: record.name,
                id: record.id,
            },
            Self::Last => UnpairedRecord::Last {
                last: record.name,
                id: record.id,
            },
        }
    }
}

/// Diagnostics only; keeps raw input out of anything client-facing.
fn truncate_for_log(line: &str) -> String {
    const LIMIT: usize = 80;
    if line.len() <= LIMIT {
        return line.to_string();
    }
    let cut = line
        .char_indices()
        .take_while(|(i, _)| *i < LIMIT)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}…", &line[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_form() {
        let record = NameRecord::new("Alice", 17);
        let line = record.to_line();
        assert_eq!(line, r#"["Alice",17]"#);
        assert_eq!(NameRecord::from_line(&line).unwrap(), record);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(NameRecord::from_line(r#"["Alice"]"#).is_err());
        assert!(NameRecord::from_line(r#"["Alice",1,2]"#).is_err());
    }

    #[test]
    fn rejects_swapped_fields_and_empty_names() {
        assert!(NameRecord::from_line(r#"[1,"Alice"]"#).is_err());
        assert!(NameRecord::from_line(r#"["",1]"#).is_err());
    }

    #[test]
    fn unicode_names_survive_the_wire() {
        let record = NameRecord::new("Ærøskøbing-花子", -3);
        assert_eq!(
            NameRecord::from_line(&record.to_line()).unwrap().name,
            "Ærøskøbing-花子"
        );
    }

    #[test]
    fn i64_boundary_ids_parse() {
        for id in [i64::MIN, i64::MAX] {
            let record = NameRecord::new("X", id);
            assert_eq!(NameRecord::from_line(&record.to_line()).unwrap().id, id);
        }
    }

    #[test]
    fn unpaired_serializes_with_one_name_key() {
        let first = UnpairedRecord::First {
            first: "Alice".into(),
            id: 1,
        };
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            r#"{"first":"Alice","id":1}"#
        );

        let last = UnpairedRecord::Last {
            last: "Smith".into(),
            id: 2,
        };
        assert_eq!(
            serde_json::to_string(&last).unwrap(),
            r#"{"last":"Smith","id":2}"#
        );
    }

    #[test]
    fn paired_serializes_with_all_three_keys() {
        let paired = PairedRecord {
            first: "Alice".into(),
            last: "Smith".into(),
            id: 1,
        };
        assert_eq!(
            serde_json::to_string(&paired).unwrap(),
            r#"{"first":"Alice","last":"Smith","id":1}"#
        );
    }
}
