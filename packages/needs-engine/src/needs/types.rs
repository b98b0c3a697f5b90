use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeedsCategory {
    ReadingProcessingDifficulty,
    MathProcessingDifficulty,
    AttentionCognitiveLoad,
    NeedsMoreScaffolding,
    LowEngagement,
    SlowProcessingSpeed,
    AuditoryPreference,
    VisualPreference,
    KinestheticPreference,
}

impl NeedsCategory {
    pub const ALL: [NeedsCategory; 9] = [
        Self::ReadingProcessingDifficulty,
        Self::MathProcessingDifficulty,
        Self::AttentionCognitiveLoad,
        Self::NeedsMoreScaffolding,
        Self::LowEngagement,
        Self::SlowProcessingSpeed,
        Self::AuditoryPreference,
        Self::VisualPreference,
        Self::KinestheticPreference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadingProcessingDifficulty => "reading-processing-difficulty",
            Self::MathProcessingDifficulty => "math-processing-difficulty",
            Self::AttentionCognitiveLoad => "attention-cognitive-load",
            Self::NeedsMoreScaffolding => "needs-more-scaffolding",
            Self::LowEngagement => "low-engagement",
            Self::SlowProcessingSpeed => "slow-processing-speed",
            Self::AuditoryPreference => "auditory-preference",
            Self::VisualPreference => "visual-preference",
            Self::KinestheticPreference => "kinesthetic-preference",
        }
    }

    /// Accepts kebab-case or snake_case labels, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ReadingProcessingDifficulty => "reading processing",
            Self::MathProcessingDifficulty => "math processing",
            Self::AttentionCognitiveLoad => "attention and cognitive load",
            Self::NeedsMoreScaffolding => "independent task completion",
            Self::LowEngagement => "engagement",
            Self::SlowProcessingSpeed => "processing speed",
            Self::AuditoryPreference => "auditory learning",
            Self::VisualPreference => "visual learning",
            Self::KinestheticPreference => "hands-on learning",
        }
    }

    /// Sensory-preference categories describe how a learner learns, not a difficulty.
    pub fn is_preference(&self) -> bool {
        matches!(
            self,
            Self::AuditoryPreference | Self::VisualPreference | Self::KinestheticPreference
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Rule,
    Model,
    Cultural,
}

impl SignalSource {
    /// Tie-break rank when two sources report the same score for a category.
    pub(crate) fn tie_rank(&self) -> u8 {
        match self {
            Self::Model => 2,
            Self::Rule => 1,
            Self::Cultural => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedsSignal {
    pub scores: BTreeMap<NeedsCategory, f64>,
    pub confidence: f64,
    pub source: SignalSource,
}

impl NeedsSignal {
    pub fn single(category: NeedsCategory, score: f64, confidence: f64, source: SignalSource) -> Self {
        let mut scores = BTreeMap::new();
        scores.insert(category, score.clamp(0.0, 1.0));
        Self {
            scores,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn score(&self, category: NeedsCategory) -> Option<f64> {
        self.scores.get(&category).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub score: f64,
    pub source: SignalSource,
}

impl CategoryScore {
    pub(crate) fn outranks(&self, other: &CategoryScore) -> bool {
        self.score > other.score
            || (self.score == other.score && self.source.tie_rank() > other.source.tie_rank())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    Hybrid,
    Fallback,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedNeedsProfile {
    pub categories: BTreeMap<NeedsCategory, CategoryScore>,
    pub confidence: f64,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    pub signals: Vec<NeedsSignal>,
}

impl FusedNeedsProfile {
    /// Fused score for `category`, 0.0 when no source reported it.
    pub fn score(&self, category: NeedsCategory) -> f64 {
        self.categories
            .get(&category)
            .map(|c| c.score)
            .unwrap_or(0.0)
    }

    pub fn model_source(&self) -> ModelSource {
        if self.fallback_used {
            ModelSource::Fallback
        } else {
            ModelSource::Hybrid
        }
    }

    /// Difficulty categories ordered by descending need-score; ties keep category order.
    pub fn ranked_needs(&self) -> Vec<(NeedsCategory, f64)> {
        let mut needs: Vec<(NeedsCategory, f64)> = self
            .categories
            .iter()
            .filter(|(category, _)| !category.is_preference())
            .map(|(category, c)| (*category, c.score))
            .collect();
        needs.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        needs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mobile" => Some(Self::Mobile),
            "tablet" => Some(Self::Tablet),
            "desktop" => Some(Self::Desktop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensoryPreferences {
    pub auditory: f64,
    pub visual: f64,
    pub kinesthetic: f64,
}

impl SensoryPreferences {
    pub fn sum(&self) -> f64 {
        self.auditory + self.visual + self.kinesthetic
    }

    pub fn as_categories(&self) -> [(NeedsCategory, f64); 3] {
        [
            (NeedsCategory::AuditoryPreference, self.auditory),
            (NeedsCategory::VisualPreference, self.visual),
            (NeedsCategory::KinestheticPreference, self.kinesthetic),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingErrors {
    pub substitutions: f64,
    pub omissions: f64,
    pub insertions: f64,
    pub reversals: f64,
    pub transpositions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathErrors {
    pub calculation: f64,
    pub procedural: f64,
    pub conceptual: f64,
    pub visual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeStats {
    pub mean: f64,
    pub variance: f64,
    pub outliers: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub prior_education: Option<String>,
    pub session_duration: Option<f64>,
    pub breaks_taken: Option<f64>,
    pub device_type: Option<DeviceType>,
    pub connectivity_quality: Option<f64>,
    pub offline_usage_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalContext {
    pub language: String,
    pub cultural_background: String,
    pub socioeconomic_context: String,
}

/// Learner context forwarded to the inference collaborator.
///
/// Callers that do not know the learner's age or grade use [`AnalysisContext::default`],
/// which assumes a 10 year old in grade 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub age_years: u8,
    pub grade_level: u8,
}

impl AnalysisContext {
    pub const DEFAULT_AGE_YEARS: u8 = 10;
    pub const DEFAULT_GRADE_LEVEL: u8 = 5;
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            age_years: Self::DEFAULT_AGE_YEARS,
            grade_level: Self::DEFAULT_GRADE_LEVEL,
        }
    }
}

/// Validated, bounds-checked sample with derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFeatureVector {
    pub reading_speed: f64,
    pub reading_accuracy: f64,
    pub reading_comprehension: f64,
    pub math_accuracy: f64,
    pub math_speed: f64,
    pub attention_span: f64,
    pub task_completion: f64,
    pub help_requests: f64,
    pub sensory: SensoryPreferences,
    pub reading_errors: ReadingErrors,
    pub math_errors: MathErrors,
    pub response_times: ResponseTimeStats,
    pub cultural: CulturalContext,
    pub session: SessionContext,
    pub error_rate: f64,
    pub repetition_needed: bool,
}

impl NormalizedFeatureVector {
    /// Flat numeric view handed to the inference collaborator.
    pub fn to_feature_map(&self) -> BTreeMap<String, f64> {
        let mut features = BTreeMap::new();
        let mut put = |key: &str, value: f64| {
            features.insert(key.to_string(), value);
        };

        put("readingSpeed", self.reading_speed);
        put("readingAccuracy", self.reading_accuracy);
        put("readingComprehension", self.reading_comprehension);
        put("mathAccuracy", self.math_accuracy);
        put("mathSpeed", self.math_speed);
        put("attentionSpan", self.attention_span);
        put("taskCompletion", self.task_completion);
        put("helpRequests", self.help_requests);
        put("audioPreference", self.sensory.auditory);
        put("visualPreference", self.sensory.visual);
        put("kinestheticPreference", self.sensory.kinesthetic);
        put("readingErrors.substitutions", self.reading_errors.substitutions);
        put("readingErrors.omissions", self.reading_errors.omissions);
        put("readingErrors.insertions", self.reading_errors.insertions);
        put("readingErrors.reversals", self.reading_errors.reversals);
        put("readingErrors.transpositions", self.reading_errors.transpositions);
        put("mathErrors.calculation", self.math_errors.calculation);
        put("mathErrors.procedural", self.math_errors.procedural);
        put("mathErrors.conceptual", self.math_errors.conceptual);
        put("mathErrors.visual", self.math_errors.visual);
        put("responseTimes.mean", self.response_times.mean);
        put("responseTimes.variance", self.response_times.variance);
        put("responseTimes.outliers", self.response_times.outliers);
        put("errorRate", self.error_rate);
        put("repetitionNeeded", if self.repetition_needed { 1.0 } else { 0.0 });

        if let Some(v) = self.session.session_duration {
            put("sessionDuration", v);
        }
        if let Some(v) = self.session.breaks_taken {
            put("breaksTaken", v);
        }
        if let Some(v) = self.session.connectivity_quality {
            put("connectivityQuality", v);
        }
        if let Some(v) = self.session.offline_usage_ratio {
            put("offlineUsageRatio", v);
        }

        features
    }
}

/// Caller-facing result of needs detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResponse {
    pub profile: FusedNeedsProfile,
    pub model_source: ModelSource,
}
