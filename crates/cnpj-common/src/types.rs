//! Common types used across the CNPJ importer

use crate::error::CnpjError;
use serde::{Deserialize, Serialize};

/// A Brazilian national registry identifier for legal entities.
///
/// Stored in its bare 14-digit form; the registry treats it as an opaque
/// key beyond format validation. Accepts the punctuated presentation form
/// (`11.111.111/0001-00`) on parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cnpj(String);

impl Cnpj {
    /// Parse a CNPJ from either bare-digit or punctuated form.
    pub fn parse(raw: &str) -> Result<Self, CnpjError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, '.' | '/' | '-' | ' '))
            .collect();

        if digits.len() != 14 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CnpjError::InvalidCnpj(raw.to_string()));
        }

        Ok(Self(digits))
    }

    /// The bare 14-digit form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cnpj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Cnpj {
    type Err = CnpjError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cnpj {
    type Error = CnpjError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cnpj> for String {
    fn from(cnpj: Cnpj) -> Self {
        cnpj.0
    }
}
