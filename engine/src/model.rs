//! Typed dashboard rows.
//!
//! The reconciler treats rows as opaque records. These types decode the
//! two resources the dashboard renders. Scores are computed upstream and
//! only carried here.

use crate::{error::Result, Error, Record};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A company score card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub ticker: String,
    pub sector: String,
    pub tci_score: f64,
    pub environment_score: f64,
    pub social_score: f64,
    pub governance_score: f64,
    pub fairness_score: f64,
    pub confidence_level: f64,
    pub last_updated: String,
}

/// Verdict on a claim against the evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Supporting,
    Contradicting,
    Neutral,
}

/// A sustainability claim made by a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub company_id: String,
    pub claim_text: String,
    /// ESG pillar the claim belongs to
    pub pillar: String,
    pub status: ClaimStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    pub confidence: f64,
    pub created_at: String,
}

fn decode<T: DeserializeOwned>(record: &Record) -> Result<T> {
    serde_json::from_value(record.to_row()).map_err(|e| {
        Error::InvalidPayload(format!("record {}: {}", record.id, e))
    })
}

fn encode<T: Serialize>(value: &T) -> Result<Record> {
    let row = serde_json::to_value(value).map_err(|e| Error::InvalidPayload(e.to_string()))?;
    Record::from_row(row)
}

impl TryFrom<&Record> for Company {
    type Error = Error;

    fn try_from(record: &Record) -> Result<Self> {
        decode(record)
    }
}

impl TryFrom<&Record> for Claim {
    type Error = Error;

    fn try_from(record: &Record) -> Result<Self> {
        decode(record)
    }
}

impl Company {
    /// Convert into a generic record.
    pub fn to_record(&self) -> Result<Record> {
        encode(self)
    }
}

impl Claim {
    /// Convert into a generic record.
    pub fn to_record(&self) -> Result<Record> {
        encode(self)
    }
}

/// Claim counts per verdict for one company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTally {
    pub supporting: usize,
    pub contradicting: usize,
    pub neutral: usize,
}

impl ClaimTally {
    /// Count claims by status.
    pub fn from_claims<'a>(claims: impl IntoIterator<Item = &'a Claim>) -> Self {
        let mut tally = Self::default();
        for claim in claims {
            match claim.status {
                ClaimStatus::Supporting => tally.supporting += 1,
                ClaimStatus::Contradicting => tally.contradicting += 1,
                ClaimStatus::Neutral => tally.neutral += 1,
            }
        }
        tally
    }

    /// Total number of claims counted.
    pub fn total(&self) -> usize {
        self.supporting + self.contradicting + self.neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn company_record() -> Record {
        Record::new(
            "c-1",
            json!({
                "name": "Tesla Inc.",
                "ticker": "TSLA",
                "sector": "Automotive",
                "tci_score": 78.5,
                "environment_score": 85,
                "social_score": 72.0,
                "governance_score": 70.1,
                "fairness_score": 66.0,
                "confidence_level": 0.9,
                "last_updated": "2024-01-15T10:30:00Z"
            }),
        )
    }

    fn claim(id: &str, status: ClaimStatus) -> Claim {
        Claim {
            id: id.to_string(),
            company_id: "c-1".to_string(),
            claim_text: "Carbon neutral by 2030".to_string(),
            pillar: "Environment".to_string(),
            status,
            evidence: None,
            confidence: 0.8,
            created_at: "2024-01-15T10:30:00Z".to_string(),
        }
    }

    #[test]
    fn decode_company() {
        let company = Company::try_from(&company_record()).unwrap();
        assert_eq!(company.id, "c-1");
        assert_eq!(company.ticker, "TSLA");
        assert_eq!(company.environment_score, 85.0);
    }

    #[test]
    fn decode_company_missing_field() {
        let record = Record::new("c-2", json!({"name": "Partial"}));
        let err = Company::try_from(&record).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(msg) if msg.starts_with("record c-2")));
    }

    #[test]
    fn claim_record_conversion() {
        let claim = claim("k-1", ClaimStatus::Contradicting);
        let record = claim.to_record().unwrap();
        assert_eq!(record.id, "k-1");
        assert_eq!(record.field("status"), Some(&json!("Contradicting")));
        assert!(record.field("evidence").is_none());
        assert_eq!(Claim::try_from(&record).unwrap(), claim);
    }

    #[test]
    fn tally_counts_by_status() {
        let claims = vec![
            claim("1", ClaimStatus::Supporting),
            claim("2", ClaimStatus::Supporting),
            claim("3", ClaimStatus::Contradicting),
            claim("4", ClaimStatus::Neutral),
        ];
        let tally = ClaimTally::from_claims(&claims);
        assert_eq!(
            tally,
            ClaimTally {
                supporting: 2,
                contradicting: 1,
                neutral: 1
            }
        );
        assert_eq!(tally.total(), 4);
    }
}
