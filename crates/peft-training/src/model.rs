use crate::error::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base models the training container knows how to fine-tune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseModel {
    #[serde(rename = "meta-llama/Meta-Llama-3-8B")]
    Llama3_8B,
    #[serde(rename = "meta-llama/Meta-Llama-3-8B-Instruct")]
    Llama3_8BInstruct,
    #[serde(rename = "meta-llama/Meta-Llama-3-70B")]
    Llama3_70B,
    #[serde(rename = "meta-llama/Meta-Llama-3-70B-Instruct")]
    Llama3_70BInstruct,
}

impl BaseModel {
    pub const ALL: [Self; 4] =
        [Self::Llama3_8B, Self::Llama3_8BInstruct, Self::Llama3_70B, Self::Llama3_70BInstruct];

    /// Hub identifier passed to the containers as `--pretrained_model_id`.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Llama3_8B => "meta-llama/Meta-Llama-3-8B",
            Self::Llama3_8BInstruct => "meta-llama/Meta-Llama-3-8B-Instruct",
            Self::Llama3_70B => "meta-llama/Meta-Llama-3-70B",
            Self::Llama3_70BInstruct => "meta-llama/Meta-Llama-3-70B-Instruct",
        }
    }

    /// Lowercase name without the organization prefix, used in display names.
    #[must_use]
    pub fn slug(self) -> String {
        let id = self.id();
        id.rsplit('/').next().unwrap_or(id).to_lowercase()
    }

    #[must_use]
    pub const fn size_class(self) -> SizeClass {
        match self {
            Self::Llama3_8B | Self::Llama3_8BInstruct => SizeClass::Small,
            Self::Llama3_70B | Self::Llama3_70BInstruct => SizeClass::Large,
        }
    }
}

impl fmt::Display for BaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BaseModel {
    type Err = TuneError;

    fn from_str(s: &str) -> TuneResult<Self> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(needle) || m.slug() == needle.to_lowercase())
            .ok_or_else(|| {
                TuneError::UnsupportedConfiguration(format!(
                    "unsupported base model '{needle}' (expected one of: {})",
                    Self::ALL.map(Self::id).join(", ")
                ))
            })
    }
}

/// Coarse parameter-count bucket that drives hardware sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Large,
}

impl SizeClass {
    /// Classify a model identifier by its parameter-count token.
    ///
    /// The token must not be preceded by another digit, so `38b` does not
    /// classify as `8b`. Returns `None` for identifiers with no known token.
    #[must_use]
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let id = model_id.to_lowercase();
        if contains_size_token(&id, "70b") {
            Some(Self::Large)
        } else if contains_size_token(&id, "8b") {
            Some(Self::Small)
        } else {
            None
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small => f.write_str("small"),
            Self::Large => f.write_str("large"),
        }
    }
}

fn contains_size_token(haystack: &str, token: &str) -> bool {
    haystack.match_indices(token).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        !before.is_some_and(|c| c.is_ascii_digit() || c == '.')
    })
}
