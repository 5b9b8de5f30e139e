//! Bridges the synchronous pipeline into an async response body.
//!
//! The pipeline is disk- and CPU-bound, so every chunk advance runs on
//! tokio's blocking pool; the reactor only ever sees channel receives. The
//! channel is bounded, which gives three things at once: the producer never
//! runs ahead of a slow client by more than a few chunks, every `send` is a
//! suspension point for the consumer side, and a dropped receiver (client
//! disconnect) fails the next `send` so the pipeline stops before starting
//! any further chunk work. Dropping the pipeline releases its workspace.

use futures::Stream;
use tokio::sync::mpsc;
use tracing::info;

use namemerge_core::{CombineStream, MergeError};

/// Chunks buffered between the blocking producer and the response body.
const CHANNEL_DEPTH: usize = 4;

/// Run `pipeline` to completion on the blocking pool, yielding its chunks
/// in production order. The returned stream is ready to hand to
/// `Body::from_stream`.
pub fn spawn_pipeline(
    pipeline: CombineStream,
) -> impl Stream<Item = Result<Vec<u8>, MergeError>> + Send {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        for chunk in pipeline {
            let failed = chunk.is_err();
            if tx.blocking_send(chunk).is_err() {
                // Receiver gone: client disconnected. The loop exit drops
                // the pipeline, which releases the workspace.
                info!("response consumer went away; pipeline cancelled");
                return;
            }
            if failed {
                // The pipeline already logged the failure; it yields
                // nothing after an error.
                return;
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use namemerge_core::{PipelineConfig, Workspace};
    use std::time::Duration;

    fn pipeline_for(doc: &str, root: &std::path::Path) -> (CombineStream, std::path::PathBuf) {
        let config = PipelineConfig {
            workspace_root: root.to_path_buf(),
            emit_batch_size: 1,
            ..Default::default()
        };
        let ws = Workspace::create(root).unwrap();
        let ws_path = ws.path().to_path_buf();
        std::fs::write(ws.input_path(), doc).unwrap();
        (CombineStream::new(ws, config).unwrap(), ws_path)
    }

    #[tokio::test]
    async fn chunks_arrive_in_production_order() {
        let root = tempfile::tempdir().unwrap();
        let doc = r#"{"first_names":[["Alice",1],["Bob",2]],"last_names":[["Smith",1]]}"#;
        let (pipeline, _) = pipeline_for(doc, root.path());

        let stream = spawn_pipeline(pipeline);
        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        let body: Vec<u8> = chunks.concat();
        let body = String::from_utf8(body).unwrap();

        let echo = body.find("[\"Alice\",1]").unwrap();
        let envelope = body.find("{\"full_names\"").unwrap();
        assert!(echo < envelope);
        assert!(body.trim_end().ends_with("]}"));
    }

    #[tokio::test]
    async fn dropping_the_consumer_cancels_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        // Enough records that the bounded channel fills and the producer
        // still has work left when we walk away.
        let items: Vec<String> = (0..200).map(|i| format!("[\"N{i}\",{i}]")).collect();
        let doc = format!("{{\"first_names\":[{}]}}", items.join(","));
        let (pipeline, ws_path) = pipeline_for(&doc, root.path());

        let mut stream = Box::pin(spawn_pipeline(pipeline));
        stream.next().await.unwrap().unwrap();
        drop(stream);

        // The blocking task notices on its next send; give it a moment.
        for _ in 0..100 {
            if !ws_path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("workspace still present after cancellation");
    }

    #[tokio::test]
    async fn pipeline_error_is_forwarded_then_stream_ends() {
        let root = tempfile::tempdir().unwrap();
        // Not validated: the splitter trips on the bad item.
        let (pipeline, ws_path) = pipeline_for(r#"{"first_names":[["A",1,2]]}"#, root.path());

        let mut stream = Box::pin(spawn_pipeline(pipeline));
        let mut saw_error = false;
        while let Some(chunk) = stream.next().await {
            if chunk.is_err() {
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert!(!ws_path.exists());
    }
}
