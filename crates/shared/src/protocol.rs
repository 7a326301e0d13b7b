use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BrandId, PromptId, RecommendationId, RecommendationStatus, SectionKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandResponse {
    pub id: BrandId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
    pub visibility: f64,
    pub avg_position: f64,
    pub trend: String,
    pub sentiment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptBrandMentionResponse {
    pub brand_id: BrandId,
    pub brand_name: String,
    pub position: i64,
    pub mentioned: bool,
    pub sentiment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInPromptResponse {
    pub domain: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    pub citation_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub id: i64,
    pub run_number: i64,
    pub scraped_at: DateTime<Utc>,
    pub visibility: f64,
    pub avg_position: f64,
    pub total_mentions: i64,
    pub brands: Vec<PromptBrandMentionResponse>,
    #[serde(default)]
    pub response_text: Option<String>,
    pub sources: Vec<SourceInPromptResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    pub id: PromptId,
    pub query: String,
    pub visibility: f64,
    pub avg_position: f64,
    pub total_mentions: i64,
    pub total_runs: i64,
    pub brands: Vec<PromptBrandMentionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDetailResponse {
    #[serde(flatten)]
    pub prompt: PromptResponse,
    pub runs: Vec<RunResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResponse {
    pub domain: String,
    pub usage: f64,
    pub avg_citations: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricResponse {
    pub value: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetricsResponse {
    pub visibility: MetricResponse,
    pub total_prompts: MetricResponse,
    pub total_sources: MetricResponse,
    pub avg_position: MetricResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVisibilityResponse {
    pub date: String,
    #[serde(default)]
    pub shopify: Option<f64>,
    #[serde(default)]
    pub woocommerce: Option<f64>,
    #[serde(default)]
    pub bigcommerce: Option<f64>,
    #[serde(default)]
    pub wix: Option<f64>,
    #[serde(default)]
    pub squarespace: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub rank: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: String,
    pub effort: String,
    pub status: RecommendationStatus,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Card count per kanban lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl ProgressCounts {
    pub fn tally(items: &[Recommendation]) -> Self {
        let mut counts = Self::default();
        for item in items {
            *counts.slot_mut(item.status) += 1;
        }
        counts
    }

    pub fn get(&self, status: RecommendationStatus) -> usize {
        match status {
            RecommendationStatus::Todo => self.todo,
            RecommendationStatus::InProgress => self.in_progress,
            RecommendationStatus::Done => self.done,
        }
    }

    pub fn total(&self) -> usize {
        self.todo + self.in_progress + self.done
    }

    fn slot_mut(&mut self, status: RecommendationStatus) -> &mut usize {
        match status {
            RecommendationStatus::Todo => &mut self.todo,
            RecommendationStatus::InProgress => &mut self.in_progress,
            RecommendationStatus::Done => &mut self.done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
    pub progress: ProgressCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: RecommendationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicSummary {
    pub headline: String,
    pub key_insight: String,
    pub biggest_opportunity: String,
    pub biggest_threat: String,
    pub recommended_focus: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWin {
    pub action: String,
    pub target_page: String,
    pub expected_outcome: String,
    pub effort_hours: f64,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalCheck {
    pub check: String,
    pub status: String,
    pub priority: String,
    pub effort: String,
    pub how_to_fix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentOpportunity {
    pub topic: String,
    pub action_type: String,
    #[serde(default)]
    pub target_queries: Vec<String>,
    pub content_brief: String,
    pub competitor_gap: String,
    pub impact: String,
    pub effort_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorGap {
    pub competitor: String,
    pub gap_type: String,
    pub description: String,
    pub evidence: String,
    pub action_to_close: String,
    pub urgency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub why: String,
    pub action: String,
}

/// Decoded payload of one report section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionPayload {
    StrategicSummary(StrategicSummary),
    QuickWins(Vec<QuickWin>),
    TechnicalChecklist(Vec<TechnicalCheck>),
    ContentOpportunities(Vec<ContentOpportunity>),
    CompetitorGaps(Vec<CompetitorGap>),
    OutreachTargets(Vec<OutreachTarget>),
}

impl SectionPayload {
    /// Validates raw JSON against the schema of `kind`.
    pub fn decode(kind: SectionKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            SectionKind::StrategicSummary => Self::StrategicSummary(serde_json::from_value(value)?),
            SectionKind::QuickWins => Self::QuickWins(serde_json::from_value(value)?),
            SectionKind::TechnicalChecklist => {
                Self::TechnicalChecklist(serde_json::from_value(value)?)
            }
            SectionKind::ContentOpportunities => {
                Self::ContentOpportunities(serde_json::from_value(value)?)
            }
            SectionKind::CompetitorGaps => Self::CompetitorGaps(serde_json::from_value(value)?),
            SectionKind::OutreachTargets => Self::OutreachTargets(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> SectionKind {
        match self {
            Self::StrategicSummary(_) => SectionKind::StrategicSummary,
            Self::QuickWins(_) => SectionKind::QuickWins,
            Self::TechnicalChecklist(_) => SectionKind::TechnicalChecklist,
            Self::ContentOpportunities(_) => SectionKind::ContentOpportunities,
            Self::CompetitorGaps(_) => SectionKind::CompetitorGaps,
            Self::OutreachTargets(_) => SectionKind::OutreachTargets,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::StrategicSummary(v) => serde_json::to_value(v),
            Self::QuickWins(v) => serde_json::to_value(v),
            Self::TechnicalChecklist(v) => serde_json::to_value(v),
            Self::ContentOpportunities(v) => serde_json::to_value(v),
            Self::CompetitorGaps(v) => serde_json::to_value(v),
            Self::OutreachTargets(v) => serde_json::to_value(v),
        }
    }

    /// Number of entries shown by the widget; a summary counts as one.
    pub fn item_count(&self) -> usize {
        match self {
            Self::StrategicSummary(_) => 1,
            Self::QuickWins(v) => v.len(),
            Self::TechnicalChecklist(v) => v.len(),
            Self::ContentOpportunities(v) => v.len(),
            Self::CompetitorGaps(v) => v.len(),
            Self::OutreachTargets(v) => v.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecommendationStatus::{Done, InProgress, Todo};

    fn card(id: &str, status: RecommendationStatus) -> Recommendation {
        Recommendation {
            id: RecommendationId::new(id),
            rank: 1,
            title: "t".into(),
            description: "d".into(),
            category: "content".into(),
            priority: "high".into(),
            effort: "2h".into(),
            status,
            steps: Vec::new(),
        }
    }

    #[test]
    fn tally_counts_every_card_once() {
        let items = vec![card("1", Todo), card("2", Done), card("3", Done), card("4", InProgress)];
        let counts = ProgressCounts::tally(&items);
        assert_eq!(
            counts,
            ProgressCounts {
                todo: 1,
                in_progress: 1,
                done: 2
            }
        );
        assert_eq!(counts.total(), items.len());
    }

    #[test]
    fn section_decode_rejects_wrong_shape() {
        let value = serde_json::json!({ "headline": "only a headline" });
        assert!(SectionPayload::decode(SectionKind::StrategicSummary, value).is_err());

        let value = serde_json::json!([{ "name": "Forbes", "type": "publication", "why": "authority", "action": "pitch" }]);
        let payload = SectionPayload::decode(SectionKind::OutreachTargets, value).expect("decode");
        assert_eq!(payload.kind(), SectionKind::OutreachTargets);
        assert_eq!(payload.item_count(), 1);
    }

    #[test]
    fn prompt_detail_flattens_prompt_fields() {
        let value = serde_json::json!({
            "id": "p1",
            "query": "best ecommerce platform",
            "visibility": 40.0,
            "avgPosition": 2.5,
            "totalMentions": 3,
            "totalRuns": 2,
            "brands": [],
            "runs": []
        });
        let detail: PromptDetailResponse = serde_json::from_value(value).expect("decode");
        assert_eq!(detail.prompt.id, PromptId::new("p1"));
        assert!(detail.runs.is_empty());
    }
}
