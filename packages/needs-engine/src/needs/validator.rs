use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::needs::config::ValidatorConfig;
use crate::needs::types::{
    CulturalContext, DeviceType, MathErrors, NormalizedFeatureVector, ReadingErrors,
    ResponseTimeStats, SensoryPreferences, SessionContext,
};

const REPETITION_HELP_THRESHOLD: f64 = 3.0;

/// Raw per-session telemetry as submitted by the client, keyed by camelCase field name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionSample(Map<String, Value>);

impl InteractionSample {
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ValidationError::NotAnObject),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        sample: &InteractionSample,
    ) -> Result<NormalizedFeatureVector, ValidationError> {
        let fields = sample.fields();

        let reading_speed = required_number(fields, "readingSpeed", "readingSpeed")?;
        let reading_accuracy = required_ratio(fields, "readingAccuracy")?;
        let reading_comprehension = required_ratio(fields, "readingComprehension")?;
        let math_accuracy = required_ratio(fields, "mathAccuracy")?;
        let math_speed = required_number(fields, "mathSpeed", "mathSpeed")?;
        let attention_span = required_number(fields, "attentionSpan", "attentionSpan")?;
        let task_completion = required_ratio(fields, "taskCompletion")?;
        let help_requests = required_number(fields, "helpRequests", "helpRequests")?;

        let raw_sensory = SensoryPreferences {
            auditory: required_number(fields, "audioPreference", "audioPreference")?,
            visual: required_number(fields, "visualPreference", "visualPreference")?,
            kinesthetic: required_number(fields, "kinestheticPreference", "kinestheticPreference")?,
        };

        let reading = required_object(fields, "readingErrors")?;
        let reading_errors = ReadingErrors {
            substitutions: required_number(reading, "substitutions", "readingErrors.substitutions")?,
            omissions: required_number(reading, "omissions", "readingErrors.omissions")?,
            insertions: required_number(reading, "insertions", "readingErrors.insertions")?,
            reversals: required_number(reading, "reversals", "readingErrors.reversals")?,
            transpositions: required_number(reading, "transpositions", "readingErrors.transpositions")?,
        };

        let math = required_object(fields, "mathErrors")?;
        let math_errors = MathErrors {
            calculation: required_number(math, "calculation", "mathErrors.calculation")?,
            procedural: required_number(math, "procedural", "mathErrors.procedural")?,
            conceptual: required_number(math, "conceptual", "mathErrors.conceptual")?,
            visual: required_number(math, "visual", "mathErrors.visual")?,
        };

        let times = required_object(fields, "responseTimes")?;
        let response_times = ResponseTimeStats {
            mean: required_number(times, "mean", "responseTimes.mean")?,
            variance: required_number(times, "variance", "responseTimes.variance")?,
            outliers: required_number(times, "outliers", "responseTimes.outliers")?,
        };

        let cultural = CulturalContext {
            language: required_string(fields, "language")?,
            cultural_background: required_string(fields, "culturalBackground")?,
            socioeconomic_context: required_string(fields, "socioeconomicContext")?,
        };

        let session = SessionContext {
            prior_education: optional_string(fields, "priorEducation")?,
            session_duration: optional_number(fields, "sessionDuration")?,
            breaks_taken: optional_number(fields, "breaksTaken")?,
            device_type: optional_device_type(fields)?,
            connectivity_quality: optional_number(fields, "connectivityQuality")?
                .map(|v| clamp_ratio("connectivityQuality", v)),
            offline_usage_ratio: optional_number(fields, "offlineUsageRatio")?
                .map(|v| clamp_ratio("offlineUsageRatio", v)),
        };

        let sensory = self.normalize_sensory(raw_sensory)?;

        Ok(NormalizedFeatureVector {
            reading_speed,
            reading_accuracy,
            reading_comprehension,
            math_accuracy,
            math_speed,
            attention_span,
            task_completion,
            help_requests,
            sensory,
            error_rate: (reading_errors.substitutions + reading_errors.omissions) / 100.0,
            repetition_needed: help_requests > REPETITION_HELP_THRESHOLD,
            reading_errors,
            math_errors,
            response_times,
            cultural,
            session,
        })
    }

    /// Rescales the triple to sum to exactly 1.0. Values already within tolerance are
    /// rescaled silently so the unit-sum invariant holds for every accepted sample.
    fn normalize_sensory(
        &self,
        raw: SensoryPreferences,
    ) -> Result<SensoryPreferences, ValidationError> {
        let largest = raw.auditory.max(raw.visual).max(raw.kinesthetic);
        if !(largest > 0.0) {
            return Err(ValidationError::ZeroSensorySum);
        }

        let sum = raw.sum();
        if (sum - 1.0).abs() > self.config.sensory_tolerance {
            warn!(
                sum,
                tolerance = self.config.sensory_tolerance,
                "sensory preferences outside tolerance, renormalizing"
            );
        }

        // Scale by the largest value first so huge finite inputs cannot overflow the sum.
        let scaled = SensoryPreferences {
            auditory: raw.auditory / largest,
            visual: raw.visual / largest,
            kinesthetic: raw.kinesthetic / largest,
        };
        let scaled_sum = scaled.sum();
        Ok(SensoryPreferences {
            auditory: scaled.auditory / scaled_sum,
            visual: scaled.visual / scaled_sum,
            kinesthetic: scaled.kinesthetic / scaled_sum,
        })
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

fn required_number(
    fields: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<f64, ValidationError> {
    let value = fields
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ValidationError::MissingField { field: path.to_string() })?;
    non_negative(value, path)
}

/// Ratio fields above 1.0 are clamped rather than rejected.
fn required_ratio(fields: &Map<String, Value>, key: &str) -> Result<f64, ValidationError> {
    let value = required_number(fields, key, key)?;
    Ok(clamp_ratio(key, value))
}

fn optional_number(fields: &Map<String, Value>, key: &str) -> Result<Option<f64>, ValidationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => non_negative(value, key).map(Some),
    }
}

fn non_negative(value: &Value, path: &str) -> Result<f64, ValidationError> {
    let number = value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValidationError::NotNumeric { field: path.to_string() })?;
    if number < 0.0 {
        return Err(ValidationError::Negative {
            field: path.to_string(),
            value: number,
        });
    }
    Ok(number)
}

fn clamp_ratio(field: &str, value: f64) -> f64 {
    if value > 1.0 {
        debug!(field, value, "ratio above 1.0, clamping");
        1.0
    } else {
        value
    }
}

fn required_object<'a>(
    fields: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field: key.to_string() }),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ValidationError::NotAnObjectField { field: key.to_string() }),
    }
}

fn required_string(fields: &Map<String, Value>, key: &str) -> Result<String, ValidationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field: key.to_string() }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::NotString { field: key.to_string() }),
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, ValidationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::NotString { field: key.to_string() }),
    }
}

fn optional_device_type(fields: &Map<String, Value>) -> Result<Option<DeviceType>, ValidationError> {
    match optional_string(fields, "deviceType")? {
        None => Ok(None),
        Some(raw) => DeviceType::parse(&raw)
            .map(Some)
            .ok_or(ValidationError::InvalidDeviceType { value: raw }),
    }
}
