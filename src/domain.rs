use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::HubError;

pub const UNKNOWN_NAME: &str = "unknown";
pub const UNKNOWN_FORMULA: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Pubchem,
    Massbank,
    Hmdb,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Pubchem => write!(f, "pubchem"),
            ProviderKind::Massbank => write!(f, "massbank"),
            ProviderKind::Hmdb => write!(f, "hmdb"),
        }
    }
}

/// `weight` keeps the provider's own mass semantics: molecular weight for
/// PubChem, exact mass for MassBank, monoisotopic or average mass for HMDB.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundRecord {
    name: String,
    formula: String,
    weight: f64,
    url: String,
}

impl CompoundRecord {
    pub fn new(
        name: Option<String>,
        formula: Option<String>,
        weight: Option<f64>,
        url: impl Into<String>,
    ) -> Self {
        let name = name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let formula = formula
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_FORMULA.to_string());
        let weight = weight
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or(0.0);
        Self {
            name,
            formula,
            weight,
            url: url.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundQuery {
    pub name: Option<String>,
    pub formula: Option<String>,
    pub weight: Option<f64>,
}

impl CompoundQuery {
    pub fn new(name: Option<String>, formula: Option<String>, weight: Option<f64>) -> Self {
        Self {
            name: clean_text(name),
            formula: clean_text(formula),
            weight: weight.filter(|value| value.is_finite() && *value > 0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.formula.is_none() && self.weight.is_none()
    }

    pub fn joined_terms(&self) -> String {
        let mut terms = Vec::new();
        if let Some(name) = &self.name {
            terms.push(name.clone());
        }
        if let Some(formula) = &self.formula {
            terms.push(formula.clone());
        }
        if let Some(weight) = self.weight {
            terms.push(weight.to_string());
        }
        terms.join(" ")
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeakList(String);

impl PeakList {
    pub fn new(raw: &str) -> Self {
        Self(raw.chars().filter(|ch| !ch.is_whitespace()).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn query_value(&self) -> String {
        urlencoding::encode(&self.0).replace("%2C", ",")
    }

    pub fn peaks(&self) -> Result<Vec<Peak>, HubError> {
        self.0
            .split(',')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (mz, intensity) = pair
                    .split_once(';')
                    .ok_or_else(|| HubError::InvalidPeakList(pair.to_string()))?;
                let mz = mz
                    .parse::<f64>()
                    .map_err(|_| HubError::InvalidPeakList(pair.to_string()))?;
                let intensity = intensity
                    .parse::<f64>()
                    .map_err(|_| HubError::InvalidPeakList(pair.to_string()))?;
                Ok(Peak { mz, intensity })
            })
            .collect()
    }
}

impl fmt::Display for PeakList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
