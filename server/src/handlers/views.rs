//! Point-in-time dashboard views.
//!
//! These back the plain HTTP endpoints: a single snapshot fetch, decoded into
//! the typed models. Live updates go through the WebSocket feed instead.

use serde::Serialize;
use tci_live_engine::{Claim, ClaimTally, Company, Record, ResourceQuery};

use crate::error::{AppError, Result};
use crate::source::DataService;

/// A company page: the score card, its claims, and their tally.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    pub company: Company,
    /// Newest first
    pub claims: Vec<Claim>,
    pub tally: ClaimTally,
}

fn decode<T>(records: &[Record]) -> Result<Vec<T>>
where
    T: for<'a> TryFrom<&'a Record, Error = tci_live_engine::Error>,
{
    records
        .iter()
        .map(|r| T::try_from(r).map_err(|e| AppError::Internal(e.to_string())))
        .collect()
}

/// All companies, highest TCI score first.
pub async fn list_companies(source: &dyn DataService) -> Result<Vec<Company>> {
    let records = source.fetch(&ResourceQuery::companies()).await?;
    decode(&records)
}

/// One company with its claims.
///
/// # Errors
///
/// `AppError::NotFound` if no company has this id.
pub async fn company_detail(source: &dyn DataService, id: &str) -> Result<CompanyDetail> {
    let records = source.fetch(&ResourceQuery::company(id)).await?;
    let company = decode::<Company>(&records)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("company {}", id)))?;

    let claims = decode::<Claim>(&source.fetch(&ResourceQuery::claims_for(id)).await?)?;
    let tally = ClaimTally::from_claims(&claims);

    tracing::debug!(company_id = %id, claims = claims.len(), "Loaded company detail");

    Ok(CompanyDetail {
        company,
        claims,
        tally,
    })
}
