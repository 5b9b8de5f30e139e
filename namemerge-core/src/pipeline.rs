//! The full request pipeline as one lazy sequence of byte chunks.
//!
//! [`CombineStream`] chains the stages over a workspace whose `input.json`
//! already holds the validated document:
//!
//! 1. split `first_names` (echoing intermediate lines downstream),
//! 2. split `last_names` (ditto),
//! 3. external-sort both sides and stage the merge - one silent advance,
//! 4. replay the paired section inside the envelope,
//! 5. replay the unpaired section and close the envelope.
//!
//! Each `next()` does a bounded amount of disk work and hands back at most
//! `emit_batch` lines, so a consumer that stops pulling stops the pipeline;
//! the exception is the sort-and-merge advance, which runs to completion
//! before the first envelope byte can exist. The workspace is released as
//! soon as the stream ends or fails, without waiting for drop.

use tracing::{debug, error};

use crate::config::PipelineConfig;
use crate::envelope::SectionEmitter;
use crate::error::{MergeError, Result};
use crate::merge::merge_sorted;
use crate::record::Side;
use crate::sort::external_sort;
use crate::split::SideSplit;
use crate::workspace::Workspace;

pub struct CombineStream {
    workspace: Workspace,
    config: PipelineConfig,
    phase: Phase,
}

enum Phase {
    SplitFirst(SideSplit),
    SplitLast(SideSplit),
    EmitPaired(SectionEmitter),
    EmitUnpaired(SectionEmitter),
    Done,
}

impl CombineStream {
    /// Start the pipeline over `workspace`, which must already contain the
    /// persisted input document. Takes ownership so every exit path ends in
    /// workspace release.
    pub fn new(workspace: Workspace, config: PipelineConfig) -> Result<Self> {
        let config = config.normalized();
        let split = SideSplit::open(
            &workspace.input_path(),
            &workspace.raw_path(Side::First.stem()),
            Side::First,
            config.emit_batch_size,
        )?;
        Ok(Self {
            workspace,
            config,
            phase: Phase::SplitFirst(split),
        })
    }

    fn fail(&mut self, e: MergeError) -> Option<Result<Vec<u8>>> {
        error!(error = %e, "pipeline failed");
        self.phase = Phase::Done;
        self.workspace.release();
        Some(Err(e))
    }

    /// Sort both sides and stage the merge output; the one advance with no
    /// bytes to show for it.
    fn sort_and_merge(&mut self) -> Result<SectionEmitter> {
        external_sort(&self.workspace, Side::First, self.config.sort_batch_size)?;
        external_sort(&self.workspace, Side::Last, self.config.sort_batch_size)?;
        let outcome = merge_sorted(&self.workspace)?;
        debug!(
            paired = outcome.paired,
            unpaired = outcome.unpaired,
            "pipeline entering emit phase"
        );
        SectionEmitter::open(
            &self.workspace.paired_path(),
            "{\"full_names\":[",
            "]",
            self.config.emit_batch_size,
        )
    }
}

impl Iterator for CombineStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.phase {
                Phase::SplitFirst(split) => match split.next_chunk() {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => return self.fail(e),
                    None => {
                        let next = SideSplit::open(
                            &self.workspace.input_path(),
                            &self.workspace.raw_path(Side::Last.stem()),
                            Side::Last,
                            self.config.emit_batch_size,
                        );
                        match next {
                            Ok(split) => self.phase = Phase::SplitLast(split),
                            Err(e) => return self.fail(e),
                        }
                    }
                },
                Phase::SplitLast(split) => match split.next_chunk() {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => return self.fail(e),
                    None => match self.sort_and_merge() {
                        Ok(emitter) => self.phase = Phase::EmitPaired(emitter),
                        Err(e) => return self.fail(e),
                    },
                },
                Phase::EmitPaired(emitter) => match emitter.next_chunk() {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => return self.fail(e),
                    None => {
                        let next = SectionEmitter::open(
                            &self.workspace.unpaired_path(),
                            ",\"unpaired\":[",
                            "]}\n",
                            self.config.emit_batch_size,
                        );
                        match next {
                            Ok(emitter) => self.phase = Phase::EmitUnpaired(emitter),
                            Err(e) => return self.fail(e),
                        }
                    }
                },
                Phase::EmitUnpaired(emitter) => match emitter.next_chunk() {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => return self.fail(e),
                    None => {
                        self.phase = Phase::Done;
                        self.workspace.release();
                        return None;
                    }
                },
                Phase::Done => return None,
            }
        }
    }
}
