//! Lock-step merge of the two sorted intermediates.
//!
//! A cursor walks each sorted file; matching ids pair up, everything else
//! lands in the unpaired stream. Because the response must emit the whole
//! paired section before the first unpaired byte, and unpaired records are
//! discovered across the entire merge, both outputs are staged to workspace
//! files during the single pass and replayed by the envelope emitter
//! afterwards. Resident memory is two records and two line buffers.
//!
//! Duplicate ids within one side pair one-to-one with the other side's run
//! at that id; once either run ends, the surplus drains as unpaired. With
//! the sort being unstable, which duplicate pairs first is arbitrary but
//! the counts are exact.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::debug;

use crate::error::Result;
use crate::ndjson::RecordReader;
use crate::record::{PairedRecord, Side};
use crate::workspace::Workspace;

/// Where the staged sections ended up, with counts for logging.
#[derive(Debug)]
pub struct MergeOutcome {
    pub paired: u64,
    pub unpaired: u64,
}

/// Merge `first.sorted.ndjson` and `last.sorted.ndjson` into the staged
/// `full_names.ndjson` and `unpaired.ndjson`.
pub fn merge_sorted(workspace: &Workspace) -> Result<MergeOutcome> {
    let mut first = RecordReader::open(workspace.sorted_path(Side::First.stem()))?;
    let mut last = RecordReader::open(workspace.sorted_path(Side::Last.stem()))?;

    let mut paired_out = LineWriter::create(workspace.paired_path())?;
    let mut unpaired_out = LineWriter::create(workspace.unpaired_path())?;

    let mut outcome = MergeOutcome {
        paired: 0,
        unpaired: 0,
    };

    let mut head_first = first.next_record()?;
    let mut head_last = last.next_record()?;

    loop {
        match (head_first.take(), head_last.take()) {
            (None, None) => break,
            (Some(f), None) => {
                unpaired_out.write_json(&Side::First.unpaired(f))?;
                outcome.unpaired += 1;
                head_first = first.next_record()?;
            }
            (None, Some(l)) => {
                unpaired_out.write_json(&Side::Last.unpaired(l))?;
                outcome.unpaired += 1;
                head_last = last.next_record()?;
            }
            (Some(f), Some(l)) => {
                if f.id == l.id {
                    paired_out.write_json(&PairedRecord {
                        first: f.name,
                        last: l.name,
                        id: f.id,
                    })?;
                    outcome.paired += 1;
                    head_first = first.next_record()?;
                    head_last = last.next_record()?;
                } else if f.id < l.id {
                    unpaired_out.write_json(&Side::First.unpaired(f))?;
                    outcome.unpaired += 1;
                    head_first = first.next_record()?;
                    head_last = Some(l);
                } else {
                    unpaired_out.write_json(&Side::Last.unpaired(l))?;
                    outcome.unpaired += 1;
                    head_first = Some(f);
                    head_last = last.next_record()?;
                }
            }
        }
    }

    paired_out.finish()?;
    unpaired_out.finish()?;
    debug!(
        paired = outcome.paired,
        unpaired = outcome.unpaired,
        "merge staged"
    );
    Ok(outcome)
}

/// One serde-serialized value per line.
struct LineWriter {
    writer: BufWriter<File>,
}

impl LineWriter {
    fn create(path: std::path::PathBuf) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    fn write_json(&mut self, value: &impl serde::Serialize) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndjson::RecordWriter;
    use crate::record::{NameRecord, UnpairedRecord};

    fn run_merge(
        first: &[(&str, i64)],
        last: &[(&str, i64)],
    ) -> (Vec<PairedRecord>, Vec<UnpairedRecord>, MergeOutcome) {
        let ws = Workspace::create(&std::env::temp_dir()).unwrap();
        for (side, records) in [(Side::First, first), (Side::Last, last)] {
            let mut writer = RecordWriter::create(ws.sorted_path(side.stem())).unwrap();
            for (name, id) in records {
                writer.write_record(&NameRecord::new(*name, *id)).unwrap();
            }
            writer.finish().unwrap();
        }

        let outcome = merge_sorted(&ws).unwrap();

        let paired = std::fs::read_to_string(ws.paired_path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let unpaired = std::fs::read_to_string(ws.unpaired_path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (paired, unpaired, outcome)
    }

    #[test]
    fn exact_match_pairs_everything() {
        let (paired, unpaired, outcome) =
            run_merge(&[("Alice", 1), ("Bob", 2)], &[("Smith", 1), ("Jones", 2)]);
        assert_eq!(
            paired,
            vec![
                PairedRecord {
                    first: "Alice".into(),
                    last: "Smith".into(),
                    id: 1
                },
                PairedRecord {
                    first: "Bob".into(),
                    last: "Jones".into(),
                    id: 2
                },
            ]
        );
        assert!(unpaired.is_empty());
        assert_eq!(outcome.paired, 2);
    }

    #[test]
    fn disjoint_ids_pair_nothing() {
        let (paired, unpaired, _) =
            run_merge(&[("Alice", 1), ("Bob", 3)], &[("Smith", 2), ("Jones", 4)]);
        assert!(paired.is_empty());
        let ids: Vec<_> = unpaired.iter().map(|u| u.id()).collect();
        // Ascending id order regardless of source side
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn one_side_empty_drains_the_other_as_unpaired() {
        let (paired, unpaired, _) = run_merge(&[("A", 10)], &[]);
        assert!(paired.is_empty());
        assert_eq!(
            unpaired,
            vec![UnpairedRecord::First {
                first: "A".into(),
                id: 10
            }]
        );
    }

    #[test]
    fn duplicates_pair_one_to_one_then_drain() {
        // Two firsts, one last at id 1: one pair, one surplus first.
        let (paired, unpaired, _) = run_merge(&[("A1", 1), ("A2", 1)], &[("S", 1)]);
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].last, "S");
        assert_eq!(
            unpaired,
            vec![UnpairedRecord::First {
                first: "A2".into(),
                id: 1
            }]
        );
    }

    #[test]
    fn duplicates_on_both_sides_pair_in_parallel() {
        let (paired, unpaired, _) =
            run_merge(&[("A1", 1), ("A2", 1), ("A3", 1)], &[("S1", 1), ("S2", 1)]);
        assert_eq!(paired.len(), 2);
        assert_eq!(unpaired.len(), 1);
        assert_eq!(unpaired[0].id(), 1);
    }

    #[test]
    fn every_input_record_is_accounted_for_exactly_once() {
        let first = [("A", 1), ("B", 2), ("C", 2), ("D", 5)];
        let last = [("S", 2), ("T", 3), ("U", 5), ("V", 5)];
        let (paired, unpaired, outcome) = run_merge(&first, &last);

        let total_in = first.len() + last.len();
        let total_out = 2 * paired.len() + unpaired.len();
        assert_eq!(total_in, total_out);
        assert_eq!(outcome.paired as usize, paired.len());
        assert_eq!(outcome.unpaired as usize, unpaired.len());
    }

    #[test]
    fn both_sides_empty_is_fine() {
        let (paired, unpaired, _) = run_merge(&[], &[]);
        assert!(paired.is_empty());
        assert!(unpaired.is_empty());
    }
}
