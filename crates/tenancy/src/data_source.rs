//! Booking-provider credential slots.
//!
//! Unbound slots form a shared pool; a slot is bound to at most one agency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, DataSourceId, DomainError, DomainResult, Entity};

/// Validation codes for data-source fields.
pub mod codes {
    pub const PCC: u16 = 20;
    pub const PROVIDER: u16 = 21;
}

/// GDS provider code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProviderCode {
    #[serde(rename = "1A")]
    Amadeus,
    #[default]
    #[serde(rename = "1V")]
    Apollo,
    #[serde(rename = "1G")]
    Galileo,
    #[serde(rename = "1P")]
    Worldspan,
}

impl ProviderCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderCode::Amadeus => "1A",
            ProviderCode::Apollo => "1V",
            ProviderCode::Galileo => "1G",
            ProviderCode::Worldspan => "1P",
        }
    }

    /// Data-source family the search backend expects.
    pub fn family(&self) -> &'static str {
        match self {
            ProviderCode::Amadeus => "amadeus",
            _ => "travelport",
        }
    }
}

impl core::str::FromStr for ProviderCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1A" => Ok(ProviderCode::Amadeus),
            "1V" => Ok(ProviderCode::Apollo),
            "1G" => Ok(ProviderCode::Galileo),
            "1P" => Ok(ProviderCode::Worldspan),
            _ => Err(DomainError::validation(
                "provider",
                codes::PROVIDER,
                "provider is invalid.",
            )),
        }
    }
}

impl core::fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub name: String,
    /// Pseudo city code.
    pub pcc: String,
    pub provider: ProviderCode,
    pub active: bool,
    pub agency: Option<AgencyId>,
    pub queue: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// A new, unbound slot.
    pub fn new(
        id: DataSourceId,
        name: &str,
        pcc: &str,
        provider: ProviderCode,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: name.trim().to_string(),
            pcc: validate_pcc(pcc)?,
            provider,
            active: true,
            agency: None,
            queue: "01".to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_pcc(&mut self, pcc: &str) -> DomainResult<()> {
        self.pcc = validate_pcc(pcc)?;
        Ok(())
    }

    /// Name reported to the search backend: the slot's own name, else its family.
    pub fn data_source_name(&self) -> &str {
        if self.name.is_empty() {
            self.provider.family()
        } else {
            &self.name
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for DataSource {
    type Id = DataSourceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_pcc(pcc: &str) -> DomainResult<String> {
    let pcc = pcc.trim().to_ascii_uppercase();
    if pcc.is_empty() || pcc.len() > 15 || !pcc.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation("pcc", codes::PCC, "pcc is invalid."));
    }
    Ok(pcc)
}
