//! HTTP client for the analysis service.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{BrandId, PromptId, RecommendationId, RecommendationStatus, SectionKind},
    error::error_message_for,
    protocol::{
        BrandResponse, DailyVisibilityResponse, DashboardMetricsResponse, PromptDetailResponse,
        PromptResponse, RecommendationsResponse, SectionPayload, SourceResponse,
        UpdateStatusRequest,
    },
};
use tracing::debug;

use crate::{error::ClientError, RecommendationService, SectionGenerator};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Clone)]
pub struct DashboardClient {
    http: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), base_url)
    }

    pub fn with_http_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        self.send(self.http.get(self.url("/health"))).await?;
        Ok(())
    }

    pub async fn brands(&self) -> Result<Vec<BrandResponse>, ClientError> {
        self.get_json("/brands").await
    }

    pub async fn prompts(&self) -> Result<Vec<PromptResponse>, ClientError> {
        self.get_json("/prompts").await
    }

    pub async fn prompt_detail(
        &self,
        prompt_id: &PromptId,
    ) -> Result<PromptDetailResponse, ClientError> {
        self.get_json(&format!("/prompts/{prompt_id}")).await
    }

    pub async fn sources(&self) -> Result<Vec<SourceResponse>, ClientError> {
        self.get_json("/sources").await
    }

    pub async fn metrics(&self) -> Result<DashboardMetricsResponse, ClientError> {
        self.get_json("/metrics").await
    }

    pub async fn visibility(&self) -> Result<Vec<DailyVisibilityResponse>, ClientError> {
        self.get_json("/visibility").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let body = self.send(self.http.get(self.url(path))).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Sends the request and returns the body of a 2xx response.
    async fn send(&self, request: RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = error_message_for(status.as_u16(), &body);
            debug!(status = status.as_u16(), %message, "analysis service returned error");
            return Err(ClientError::api(status.as_u16(), message));
        }
        Ok(body)
    }
}

#[async_trait]
impl SectionGenerator for DashboardClient {
    async fn generate_section(
        &self,
        brand_id: &BrandId,
        section: SectionKind,
        force_refresh: bool,
    ) -> Result<SectionPayload, ClientError> {
        let request = self
            .http
            .post(self.url(&format!("/suggestions/{brand_id}/{}", section.key())))
            .query(&[("force_refresh", force_refresh)]);
        let body = self.send(request).await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;
        Ok(SectionPayload::decode(section, value)?)
    }
}

#[async_trait]
impl RecommendationService for DashboardClient {
    async fn recommendations(
        &self,
        brand_id: &BrandId,
    ) -> Result<RecommendationsResponse, ClientError> {
        self.get_json(&format!("/geo/recommendations/{brand_id}"))
            .await
    }

    async fn generate_recommendations(
        &self,
        brand_id: &BrandId,
        force_refresh: bool,
    ) -> Result<RecommendationsResponse, ClientError> {
        let request = self
            .http
            .post(self.url(&format!("/geo/recommendations/{brand_id}/generate")))
            .query(&[("force_refresh", force_refresh)]);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_recommendation_status(
        &self,
        recommendation_id: &RecommendationId,
        status: RecommendationStatus,
    ) -> Result<(), ClientError> {
        let request = self
            .http
            .patch(self.url(&format!("/geo/recommendations/{recommendation_id}/status")))
            .json(&UpdateStatusRequest { status });
        self.send(request).await?;
        Ok(())
    }
}
