//! Background pruning of expired sessions.

use crate::error::DepotError;
use crate::storage::Storage;
use chrono::Utc;
use std::time::Duration;
use tokio::time;

pub fn spawn_cleanup_task(storage: Storage) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600)); // hourly
        loop {
            interval.tick().await;
            if let Err(e) = prune_sessions(&storage) {
                tracing::error!("session cleanup error: {}", e);
            }
        }
    });
}

fn prune_sessions(storage: &Storage) -> Result<(), DepotError> {
    let conn = storage.conn()?;
    let now = Utc::now().timestamp();
    let pruned = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
    if pruned > 0 {
        tracing::debug!(pruned, "expired sessions removed");
    }
    Ok(())
}
