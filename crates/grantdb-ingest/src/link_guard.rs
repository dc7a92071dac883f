//! Duplicate suppression for submitted links.
//!
//! A link is claimed by writing a `processed` status keyed by its hash. The
//! lookup and the insert run under one lock, so concurrent claims for the
//! same link yield exactly one winner. Share one guard per store.
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use grantdb_core::error::StoreResult;
use grantdb_core::{DocumentStore, LinkState, LinkStatus};

/// Stable content hash of a link (BLAKE3, hex).
pub fn link_hash(link: &str) -> String {
    blake3::hash(link.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the link; the new status record is returned.
    Claimed(LinkStatus),
    /// Someone claimed it first; their record is returned.
    AlreadySeen(LinkStatus),
}

impl Claim {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }

    pub fn status(&self) -> &LinkStatus {
        match self {
            Self::Claimed(s) | Self::AlreadySeen(s) => s,
        }
    }
}

pub struct LinkGuard {
    store: Arc<dyn DocumentStore>,
    claim_lock: Mutex<()>,
}

impl LinkGuard {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, claim_lock: Mutex::new(()) }
    }

    /// Claim `link` unless an active record for it already exists.
    /// Storage failures propagate; they never count as a claim.
    pub async fn claim_if_unseen(&self, link: &str) -> StoreResult<Claim> {
        let hash = link_hash(link);
        let _held = self.claim_lock.lock().await;
        if let Some(existing) = self.store.find_active_link(&hash).await? {
            debug!(link, state = %existing.state, "link already claimed");
            return Ok(Claim::AlreadySeen(existing));
        }
        let now = Utc::now();
        let status = LinkStatus { id: Uuid::new_v4().to_string(), link_hash: hash, state: LinkState::Processed, created_at: now, updated_at: now };
        self.store.insert_link(&status).await?;
        info!(link, status_id = %status.id, "link claimed");
        Ok(Claim::Claimed(status))
    }

    /// The active record for `link`, if any.
    pub async fn active(&self, link: &str) -> StoreResult<Option<LinkStatus>> {
        self.store.find_active_link(&link_hash(link)).await
    }

    pub async fn mark_processing(&self, status_id: &str) -> StoreResult<()> {
        self.store.set_link_state(status_id, LinkState::Processing).await
    }

    pub async fn mark_completed(&self, status_id: &str) -> StoreResult<()> {
        self.store.set_link_state(status_id, LinkState::Completed).await
    }

    /// Release the claim so the link may be submitted again.
    pub async fn mark_failed(&self, status_id: &str) -> StoreResult<()> {
        self.store.set_link_state(status_id, LinkState::Failed).await
    }
}
