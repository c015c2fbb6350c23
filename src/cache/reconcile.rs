use tracing::debug;

use super::TicketCache;
use crate::types::Ticket;

/// Tracked tickets split by whether the cached copy can be trusted.
#[derive(Debug, Default, PartialEq)]
pub struct CachePartition {
    pub fresh: Vec<Ticket>,
    pub to_refetch: Vec<String>,
}

/// A cached ticket is only trusted once it has reached a closed status;
/// anything still open may have changed upstream.
pub fn is_cache_fresh(ticket: Option<&Ticket>, closed_statuses: &[String]) -> bool {
    ticket.is_some_and(|t| t.is_closed(closed_statuses))
}

pub fn reconcile(
    cache: &TicketCache,
    tracked_keys: &[String],
    closed_statuses: &[String],
) -> CachePartition {
    let mut partition = CachePartition::default();

    for key in tracked_keys {
        match cache.load(key) {
            Some(ticket) if is_cache_fresh(Some(&ticket), closed_statuses) => {
                partition.fresh.push(ticket);
            }
            _ => partition.to_refetch.push(key.clone()),
        }
    }

    debug!(
        fresh = partition.fresh.len(),
        stale = partition.to_refetch.len(),
        "reconciled ticket cache"
    );
    partition
}
