use crate::error::{TuneError, TuneResult};
use crate::hardware::PrecisionMode;
use crate::model::BaseModel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the training records come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetRef {
    /// A named hub dataset, e.g. `timdettmers/openassistant-guanaco`.
    Named { name: String },
    /// A URI to line-delimited JSON records, e.g. `gs://bucket/train.jsonl`.
    Uri { uri: String },
}

impl DatasetRef {
    /// Interpret a user-supplied reference: anything with a `scheme://` prefix
    /// is a URI, everything else a named dataset.
    pub fn parse(reference: &str) -> TuneResult<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(TuneError::InvalidSpec("dataset reference is required".to_string()));
        }
        if reference.contains("://") {
            Ok(Self::Uri { uri: reference.to_string() })
        } else {
            Ok(Self::Named { name: reference.to_string() })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Named { name } => name,
            Self::Uri { uri } => uri,
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduler {
    Cosine,
    Linear,
    Constant,
}

impl LrScheduler {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Linear => "linear",
            Self::Constant => "constant",
        }
    }
}

impl std::str::FromStr for LrScheduler {
    type Err = TuneError;

    fn from_str(s: &str) -> TuneResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "linear" => Ok(Self::Linear),
            "constant" => Ok(Self::Constant),
            other => Err(TuneError::InvalidSpec(format!("unknown lr scheduler '{other}'"))),
        }
    }
}

/// LoRA hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterParams {
    pub rank: u32,
    pub alpha: u32,
    pub dropout: f64,
}

impl Default for AdapterParams {
    fn default() -> Self {
        Self { rank: 16, alpha: 32, dropout: 0.05 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHyperParams {
    pub max_seq_length: u32,
    pub per_device_batch_size: u32,
    pub gradient_accumulation_steps: u32,
    pub max_steps: u32,
    pub learning_rate: f64,
    pub lr_scheduler: LrScheduler,
}

impl Default for TrainingHyperParams {
    fn default() -> Self {
        Self {
            max_seq_length: 4096,
            per_device_batch_size: 1,
            gradient_accumulation_steps: 4,
            max_steps: 10,
            learning_rate: 5e-5,
            lr_scheduler: LrScheduler::Cosine,
        }
    }
}

impl TrainingHyperParams {
    pub fn validate(&self) -> TuneResult<()> {
        if self.max_seq_length == 0 {
            return Err(TuneError::InvalidSpec("max_seq_length must be >= 1".to_string()));
        }
        if self.per_device_batch_size == 0 {
            return Err(TuneError::InvalidSpec("batch_size must be >= 1".to_string()));
        }
        if self.gradient_accumulation_steps == 0 {
            return Err(TuneError::InvalidSpec("gradient_accumulation_steps must be >= 1".to_string()));
        }
        if self.max_steps == 0 {
            return Err(TuneError::InvalidSpec("max_steps must be >= 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TuneError::InvalidSpec("learning_rate must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Everything the training container needs to know about one fine-tuning run.
///
/// Built once per run through [`FineTuneRequest::new`] plus the `with_*`
/// helpers, then validated and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuneRequest {
    pub base_model: BaseModel,
    pub dataset: DatasetRef,
    pub text_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub adapter: AdapterParams,
    pub hyperparams: TrainingHyperParams,
    pub precision_mode: PrecisionMode,
}

pub const DEFAULT_DATASET: &str = "timdettmers/openassistant-guanaco";
pub const DEFAULT_TEMPLATE: &str = "openassistant-guanaco";

impl FineTuneRequest {
    #[must_use]
    pub fn new(base_model: BaseModel, dataset: DatasetRef) -> Self {
        Self {
            base_model,
            dataset,
            text_column: "text".to_string(),
            template: Some(DEFAULT_TEMPLATE.to_string()),
            adapter: AdapterParams::default(),
            hyperparams: TrainingHyperParams::default(),
            precision_mode: PrecisionMode::FourBit,
        }
    }

    #[must_use]
    pub fn with_precision(mut self, precision_mode: PrecisionMode) -> Self {
        self.precision_mode = precision_mode;
        self
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: AdapterParams) -> Self {
        self.adapter = adapter;
        self
    }

    #[must_use]
    pub fn with_hyperparams(mut self, hyperparams: TrainingHyperParams) -> Self {
        self.hyperparams = hyperparams;
        self
    }

    #[must_use]
    pub fn with_text_column(mut self, text_column: impl Into<String>) -> Self {
        self.text_column = text_column.into();
        self
    }

    #[must_use]
    pub fn with_template(mut self, template: Option<String>) -> Self {
        self.template = template.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.dataset.as_str().trim().is_empty() {
            return Err(TuneError::InvalidSpec("dataset reference is required".to_string()));
        }
        if self.text_column.trim().is_empty() {
            return Err(TuneError::InvalidSpec("text_column is required".to_string()));
        }
        if self.adapter.rank == 0 {
            return Err(TuneError::InvalidSpec("lora rank must be >= 1".to_string()));
        }
        if self.adapter.alpha == 0 {
            return Err(TuneError::InvalidSpec("lora alpha must be >= 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.adapter.dropout) {
            return Err(TuneError::InvalidSpec("lora dropout must be in [0, 1)".to_string()));
        }
        self.hyperparams.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FineTuneRequest {
        FineTuneRequest::new(BaseModel::Llama3_8B, DatasetRef::parse(DEFAULT_DATASET).unwrap())
    }

    #[test]
    fn test_defaults_validate() {
        let req = request();
        assert!(req.validate().is_ok());
        assert_eq!(req.precision_mode, PrecisionMode::FourBit);
        assert_eq!(req.template.as_deref(), Some(DEFAULT_TEMPLATE));
    }

    #[test]
    fn test_dataset_ref_parse() {
        assert_eq!(
            DatasetRef::parse("gs://bucket/data/train.jsonl").unwrap(),
            DatasetRef::Uri { uri: "gs://bucket/data/train.jsonl".to_string() }
        );
        assert!(matches!(DatasetRef::parse("org/dataset").unwrap(), DatasetRef::Named { .. }));
        assert!(DatasetRef::parse("   ").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        let req = request().with_adapter(AdapterParams { rank: 0, ..AdapterParams::default() });
        assert!(req.validate().is_err());

        let req = request().with_adapter(AdapterParams { alpha: 0, ..AdapterParams::default() });
        assert!(req.validate().is_err());

        for hp in [
            TrainingHyperParams { max_seq_length: 0, ..TrainingHyperParams::default() },
            TrainingHyperParams { per_device_batch_size: 0, ..TrainingHyperParams::default() },
            TrainingHyperParams { max_steps: 0, ..TrainingHyperParams::default() },
            TrainingHyperParams { learning_rate: f64::NAN, ..TrainingHyperParams::default() },
        ] {
            assert!(request().with_hyperparams(hp).validate().is_err());
        }
    }

    #[test]
    fn test_validate_rejects_bad_dropout_and_column() {
        let req = request().with_adapter(AdapterParams { dropout: 1.0, ..AdapterParams::default() });
        assert!(req.validate().is_err());
        assert!(request().with_text_column(" ").validate().is_err());
    }

    #[test]
    fn test_blank_template_is_dropped() {
        let req = request().with_template(Some("  ".to_string()));
        assert!(req.template.is_none());
    }
}
