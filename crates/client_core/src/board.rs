//! Kanban board of recommendations with optimistic status changes.
//!
//! A drop is applied locally before the service confirms it. If the persist
//! call fails, the board returns to the exact snapshot taken before the drop
//! (cards and counts together).

use std::sync::Arc;

use shared::{
    domain::{BrandId, RecommendationId, RecommendationStatus},
    protocol::{ProgressCounts, Recommendation, RecommendationsResponse},
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{error::ClientError, RecommendationService};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub items: Vec<Recommendation>,
    pub counts: ProgressCounts,
}

impl BoardSnapshot {
    pub fn from_items(items: Vec<Recommendation>) -> Self {
        let counts = ProgressCounts::tally(&items);
        Self { items, counts }
    }

    pub fn lane(&self, status: RecommendationStatus) -> Vec<&Recommendation> {
        self.items.iter().filter(|item| item.status == status).collect()
    }

    /// Share of cards in `done`, rounded to a whole percent.
    pub fn completion_percent(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }
        ((self.counts.done as f64 / self.items.len() as f64) * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanePosition {
    pub lane: RecommendationStatus,
    pub index: usize,
}

impl LanePosition {
    pub fn new(lane: RecommendationStatus, index: usize) -> Self {
        Self { lane, index }
    }
}

/// A completed drag. `destination` is `None` when the card was dropped
/// outside every lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    pub item_id: RecommendationId,
    pub source: LanePosition,
    pub destination: Option<LanePosition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Nothing changed and nothing was sent.
    NoOp,
    Committed(RecommendationStatus),
    /// The service rejected the change; the pre-drop snapshot is back.
    RolledBack(ClientError),
}

pub struct RecommendationBoard {
    service: Arc<dyn RecommendationService>,
    snapshot: watch::Sender<BoardSnapshot>,
    // held for the whole drop, persist call included
    mutation: Mutex<()>,
}

impl RecommendationBoard {
    pub fn new(service: Arc<dyn RecommendationService>) -> Self {
        let (snapshot, _) = watch::channel(BoardSnapshot::default());
        Self {
            service,
            snapshot,
            mutation: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshot.subscribe()
    }

    pub async fn load(&self, brand_id: &BrandId) -> Result<BoardSnapshot, ClientError> {
        let response = self.service.recommendations(brand_id).await?;
        Ok(self.replace(brand_id, response).await)
    }

    /// Replaces the whole board with freshly generated recommendations.
    pub async fn generate(
        &self,
        brand_id: &BrandId,
        force_refresh: bool,
    ) -> Result<BoardSnapshot, ClientError> {
        let response = self
            .service
            .generate_recommendations(brand_id, force_refresh)
            .await?;
        Ok(self.replace(brand_id, response).await)
    }

    async fn replace(&self, brand_id: &BrandId, response: RecommendationsResponse) -> BoardSnapshot {
        let _guard = self.mutation.lock().await;
        let next = BoardSnapshot::from_items(response.recommendations);
        if next.counts != response.progress {
            warn!(
                brand = %brand_id,
                reported = ?response.progress,
                counted = ?next.counts,
                "service progress disagrees with card statuses; using card statuses"
            );
        }
        info!(brand = %brand_id, cards = next.items.len(), "recommendation board replaced");
        self.snapshot.send_replace(next.clone());
        next
    }

    pub async fn handle_drop(&self, drop: DropEvent) -> DropOutcome {
        let Some(destination) = drop.destination else {
            return DropOutcome::NoOp;
        };
        if destination == drop.source {
            return DropOutcome::NoOp;
        }

        let _guard = self.mutation.lock().await;
        let before = self.snapshot();
        let Some(position) = before.items.iter().position(|item| item.id == drop.item_id) else {
            debug!(item = %drop.item_id, "dropped card is not on the board");
            return DropOutcome::NoOp;
        };

        let mut items = before.items.clone();
        items[position].status = destination.lane;
        self.snapshot.send_replace(BoardSnapshot::from_items(items));

        match self
            .service
            .update_recommendation_status(&drop.item_id, destination.lane)
            .await
        {
            Ok(()) => {
                debug!(item = %drop.item_id, status = %destination.lane, "status change confirmed");
                DropOutcome::Committed(destination.lane)
            }
            Err(err) => {
                warn!(item = %drop.item_id, status = %destination.lane, "status change rejected, rolling back: {err}");
                self.snapshot.send_replace(before);
                DropOutcome::RolledBack(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
