//! Data orchestration for the brand-visibility dashboard: remote queries,
//! cached report sections, the optimistic recommendation board and the
//! global search index.

use async_trait::async_trait;
use shared::{
    domain::{BrandId, RecommendationId, RecommendationStatus, SectionKind},
    protocol::{RecommendationsResponse, SectionPayload},
};

pub mod api;
pub mod app_context;
pub mod board;
pub mod error;
pub mod query;
pub mod search;
pub mod sections;

pub use api::DashboardClient;
pub use app_context::{AppContext, AppState};
pub use board::{BoardSnapshot, DropEvent, DropOutcome, LanePosition, RecommendationBoard};
pub use error::ClientError;
pub use query::{QueryFetcher, QueryState, QueryStatus, QueryUnit, Settled};
pub use search::{
    spawn_debounced_search, DebouncedSearch, SearchIndex, SearchResult, SearchResultGroup,
    SearchSelection,
};
pub use sections::{CacheRecord, SectionOrchestrator};

/// Generates one report section. Generation may take seconds and fails
/// independently per section.
#[async_trait]
pub trait SectionGenerator: Send + Sync {
    async fn generate_section(
        &self,
        brand_id: &BrandId,
        section: SectionKind,
        force_refresh: bool,
    ) -> Result<SectionPayload, ClientError>;
}

#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn recommendations(
        &self,
        brand_id: &BrandId,
    ) -> Result<RecommendationsResponse, ClientError>;
    async fn generate_recommendations(
        &self,
        brand_id: &BrandId,
        force_refresh: bool,
    ) -> Result<RecommendationsResponse, ClientError>;
    async fn update_recommendation_status(
        &self,
        recommendation_id: &RecommendationId,
        status: RecommendationStatus,
    ) -> Result<(), ClientError>;
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod api_tests;
