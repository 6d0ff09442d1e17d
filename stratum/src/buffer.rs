//! Share Buffer
//!
//! Accepted shares queue in memory and drain to storage on the flush
//! interval. The drain is swap-and-flush so the submit path never waits
//! on the database; a failed batch goes back on the front of the buffer
//! and is retried at the next interval, never dropped.

use mergepool_storage::Share;

use crate::server::PoolServer;
use crate::PoolError;

impl PoolServer {
    /// Queues one accepted share
    pub(crate) fn push_share(&self, share: Share) {
        self.share_buffer.lock().unwrap().push(share);
    }

    /// Shares currently waiting for the next flush
    pub fn buffered_shares(&self) -> usize {
        self.share_buffer.lock().unwrap().len()
    }

    /// Drains the buffer and writes the batch
    pub async fn flush_shares(&self) -> Result<usize, PoolError> {
        let batch: Vec<Share> = {
            let mut buffer = self.share_buffer.lock().unwrap();
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return Ok(0);
        }

        match self.shares_store.insert_batch(&batch).await {
            Ok(()) => Ok(batch.len()),
            Err(err) => {
                let mut buffer = self.share_buffer.lock().unwrap();
                buffer.splice(0..0, batch);
                Err(PoolError::Storage(err))
            }
        }
    }
}
