use super::{Processor, ProcessorError};
use crate::{
    model::constants::{BULK_BATCH_THRESHOLD, PLAYERS_PER_PARTITION},
    threading::worker_pool::WorkerPool,
    utils::progress_utils::progress_bar
};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

impl Processor {
    /// Recomputes every player of the mode, one partition of player ids at
    /// a time.
    ///
    /// After each partition all writes are flushed and awaited before the
    /// last handled player id is stored, so an interrupted run can resume
    /// from there with `resume`. Without it the checkpoint is reset to 0.
    pub fn process_all(self: &Arc<Self>, resume: bool, threads: usize) -> Result<(), ProcessorError> {
        let threads = threads.max(1);
        let contexts = (0..threads)
            .map(|i| {
                self.thread_context(&format!("bulk-{i}"), BULK_BATCH_THRESHOLD)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let key = self.mode.last_player_id_key();
        let mut current = if resume {
            self.retrieve_count(&key)?
        } else {
            // A crash before the first checkpoint still reprocesses everyone
            self.store_count(&key, 0)?;
            0
        };

        let total = self.replica.player_count_from(self.mode, current)?;
        info!(from = current, total, threads, "Processing all players");

        let bar = Arc::new(progress_bar(total.max(0) as u64, "players"));
        let pool = WorkerPool::new("players", threads);
        let mut next = 0;

        loop {
            let ids = self.replica.player_ids_after(self.mode, current, PLAYERS_PER_PARTITION)?;
            if ids.is_empty() {
                break;
            }

            for player_id in ids {
                let ctx = Arc::clone(&contexts[next]);
                next = (next + 1) % threads;

                let processor = Arc::clone(self);
                let bar = Arc::clone(&bar);
                pool.enqueue(move || {
                    if let Err(e) = processor.process_player(None, &ctx, player_id) {
                        warn!(player_id, error = %e, "Failed to process player");
                    }
                    bar.inc(1);
                });

                current = current.max(player_id);

                if self.shutdown_requested() {
                    info!(player_id, "Shutdown requested, stopping before the next checkpoint");
                    return Ok(());
                }
            }

            pool.drain();
            for ctx in &contexts {
                ctx.settle()?;
            }

            self.store_count(&key, current)?;
        }

        bar.finish_and_clear();
        self.primary.wait_idle(Duration::from_millis(1))?;
        info!(players = total, elapsed = ?bar.elapsed(), "Processed all players");

        Ok(())
    }
}
