//! Bounded-memory external sort of an intermediate by `id`.
//!
//! Two phases. Run generation reads the intermediate sequentially,
//! accumulating at most `batch_size` records, sorting each full batch
//! in place and writing it out as a chunk file in the workspace. The
//! k-way merge then walks every chunk through a min-heap keyed by
//! `(id, chunk_index)` - the chunk index keeps equal keys deterministic
//! even though stability is not promised. At any moment the resident set
//! is one batch during phase one, then one record per chunk plus the heap.
//!
//! Chunk files are unlinked the moment the merge drains them; workspace
//! teardown is only the fallback for error paths.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;
use crate::ndjson::{RecordReader, RecordWriter};
use crate::record::{NameRecord, Side};
use crate::workspace::Workspace;

/// Sort one side's intermediate into `<side>.sorted.ndjson`, returning the
/// sorted path. An empty intermediate produces an empty sorted file.
pub fn external_sort(workspace: &Workspace, side: Side, batch_size: usize) -> Result<PathBuf> {
    let sorted = workspace.sorted_path(side.stem());

    let chunks = write_runs(workspace, side, batch_size)?;
    debug!(
        side = side.key(),
        chunks = chunks.len(),
        "sort runs generated"
    );
    merge_runs(chunks, &sorted)?;
    Ok(sorted)
}

/// Phase 1: sorted runs of at most `batch_size` records each.
fn write_runs(workspace: &Workspace, side: Side, batch_size: usize) -> Result<Vec<PathBuf>> {
    let mut reader = RecordReader::open(workspace.raw_path(side.stem()))?;
    let mut chunks = Vec::new();
    let mut batch: Vec<NameRecord> = Vec::with_capacity(batch_size);

    while let Some(record) = reader.next_record()? {
        batch.push(record);
        if batch.len() >= batch_size {
            chunks.push(flush_run(workspace, side, chunks.len(), &mut batch)?);
        }
    }
    if !batch.is_empty() {
        chunks.push(flush_run(workspace, side, chunks.len(), &mut batch)?);
    }
    Ok(chunks)
}

fn flush_run(
    workspace: &Workspace,
    side: Side,
    index: usize,
    batch: &mut Vec<NameRecord>,
) -> Result<PathBuf> {
    batch.sort_unstable_by_key(|record| record.id);

    let path = workspace.chunk_path(side.stem(), index);
    let mut writer = RecordWriter::create(&path)?;
    for record in batch.drain(..) {
        writer.write_record(&record)?;
    }
    writer.finish()?;
    Ok(path)
}

/// Head of one chunk inside the merge heap. Ordering is reversed so the
/// smallest `(id, chunk)` surfaces first in `BinaryHeap`'s max-heap.
struct MergeEntry {
    record: NameRecord,
    chunk: usize,
}

impl MergeEntry {
    fn key(&self) -> (i64, usize) {
        (self.record.id, self.chunk)
    }
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

struct ChunkCursor {
    reader: RecordReader<std::io::BufReader<std::fs::File>>,
    path: PathBuf,
}

/// Phase 2: drain every run through the heap into the sorted output.
fn merge_runs(chunks: Vec<PathBuf>, sorted: &std::path::Path) -> Result<()> {
    let mut writer = RecordWriter::create(sorted)?;
    let mut cursors = Vec::with_capacity(chunks.len());
    let mut heap = BinaryHeap::with_capacity(chunks.len());

    for (chunk, path) in chunks.into_iter().enumerate() {
        let mut reader = RecordReader::open(&path)?;
        if let Some(record) = reader.next_record()? {
            heap.push(MergeEntry { record, chunk });
        }
        cursors.push(ChunkCursor { reader, path });
    }

    while let Some(MergeEntry { record, chunk }) = heap.pop() {
        writer.write_record(&record)?;
        let cursor = &mut cursors[chunk];
        match cursor.reader.next_record()? {
            Some(next) => heap.push(MergeEntry {
                record: next,
                chunk,
            }),
            None => {
                if let Err(e) = std::fs::remove_file(&cursor.path) {
                    warn!(path = %cursor.path.display(), error = %e, "failed to remove sort chunk");
                }
            }
        }
    }
    writer.finish()
}
