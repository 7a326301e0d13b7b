use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(BrandId);
id_newtype!(PromptId);
id_newtype!(RecommendationId);

/// Kanban lane of a recommendation card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Todo,
    InProgress,
    Done,
}

impl RecommendationStatus {
    pub const ALL: [RecommendationStatus; 3] = [Self::Todo, Self::InProgress, Self::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(UnknownVariant {
                kind: "recommendation status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Prompts,
    Brands,
    Sources,
}

impl SearchCategory {
    /// Display order of result groups.
    pub const ORDER: [SearchCategory; 3] = [Self::Prompts, Self::Brands, Self::Sources];

    pub fn label(self) -> &'static str {
        match self {
            Self::Prompts => "Prompts",
            Self::Brands => "Brands",
            Self::Sources => "Sources",
        }
    }
}

/// One independently generated widget of the suggestions report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    StrategicSummary,
    QuickWins,
    TechnicalChecklist,
    ContentOpportunities,
    CompetitorGaps,
    OutreachTargets,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        Self::StrategicSummary,
        Self::QuickWins,
        Self::TechnicalChecklist,
        Self::ContentOpportunities,
        Self::CompetitorGaps,
        Self::OutreachTargets,
    ];

    /// Cache key and URL path segment.
    pub fn key(self) -> &'static str {
        match self {
            Self::StrategicSummary => "strategic_summary",
            Self::QuickWins => "quick_wins",
            Self::TechnicalChecklist => "technical_checklist",
            Self::ContentOpportunities => "content_opportunities",
            Self::CompetitorGaps => "competitor_gaps",
            Self::OutreachTargets => "outreach_targets",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SectionKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "section",
                value: value.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in RecommendationStatus::ALL {
            assert_eq!(status.as_str().parse::<RecommendationStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_string(&RecommendationStatus::InProgress).expect("json"),
            "\"in_progress\""
        );
    }

    #[test]
    fn rejects_unknown_section_key() {
        let err = "pricing".parse::<SectionKind>().expect_err("unknown");
        assert_eq!(err.to_string(), "unknown section: pricing");
    }
}
