//! Shared booking/display parameters owned by every Agency, Team and User.
//!
//! A template is always held **by value**. New tenants get a snapshot of
//! their parent's template through [`ConfigTemplateBuilder::from_parent`];
//! edits made to the parent afterwards never reach the copy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tripdesk_core::{DomainError, DomainResult, ValueObject};

/// Validation codes for template fields.
pub mod codes {
    pub const CURRENCY: u16 = 13;
    pub const DATE_FORMAT: u16 = 14;
    pub const CARRIER: u16 = 15;
}

/// Date rendering convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "USA")]
    Usa,
    #[serde(rename = "UK")]
    Uk,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::Usa => "USA",
            DateFormat::Uk => "UK",
        }
    }
}

impl core::str::FromStr for DateFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USA" => Ok(DateFormat::Usa),
            "UK" => Ok(DateFormat::Uk),
            _ => Err(DomainError::validation(
                "date_type",
                codes::DATE_FORMAT,
                "date_type is invalid.",
            )),
        }
    }
}

impl core::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO-4217 style three-letter currency code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation(
                "currency",
                codes::CURRENCY,
                "currency is invalid.",
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The "common parameters" record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub currency: CurrencyCode,
    pub date_format: DateFormat,
    pub booking_enabled: bool,
    pub markup: bool,
    pub markup_by_itinerary: bool,
    pub branded_fares: bool,
    pub virtual_interlining: bool,
    pub consolidate_ticket: bool,
    /// Two-character airline designators, kept sorted and de-duplicated.
    pub excluded_carriers: BTreeSet<String>,
}

impl ValueObject for ConfigTemplate {}

impl Default for ConfigTemplate {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::default(),
            date_format: DateFormat::default(),
            booking_enabled: true,
            markup: false,
            markup_by_itinerary: false,
            branded_fares: false,
            virtual_interlining: false,
            consolidate_ticket: false,
            excluded_carriers: BTreeSet::new(),
        }
    }
}

impl ConfigTemplate {
    pub fn builder() -> ConfigTemplateBuilder {
        ConfigTemplateBuilder::from_parent(&ConfigTemplate::default())
    }

    /// Value copy for a child tenant.
    pub fn fork(&self) -> ConfigTemplate {
        ConfigTemplateBuilder::from_parent(self).snapshot()
    }

    /// Fork of `parent`, or the default template when the parent has none yet.
    pub fn fork_or_default(parent: Option<&ConfigTemplate>) -> ConfigTemplate {
        parent.map(ConfigTemplate::fork).unwrap_or_default()
    }

    /// Apply the currency/date pair edited through an owner's info view.
    pub fn set_display(&mut self, currency: &str, date_format: &str) -> DomainResult<()> {
        let currency = CurrencyCode::parse(currency)?;
        let date_format = date_format.parse::<DateFormat>()?;
        self.currency = currency;
        self.date_format = date_format;
        Ok(())
    }
}

/// Field-by-field snapshot construction.
#[derive(Debug, Clone)]
pub struct ConfigTemplateBuilder {
    currency: CurrencyCode,
    date_format: DateFormat,
    booking_enabled: bool,
    markup: bool,
    markup_by_itinerary: bool,
    branded_fares: bool,
    virtual_interlining: bool,
    consolidate_ticket: bool,
    excluded_carriers: Vec<String>,
}

impl ConfigTemplateBuilder {
    pub fn from_parent(parent: &ConfigTemplate) -> Self {
        Self {
            currency: parent.currency.clone(),
            date_format: parent.date_format,
            booking_enabled: parent.booking_enabled,
            markup: parent.markup,
            markup_by_itinerary: parent.markup_by_itinerary,
            branded_fares: parent.branded_fares,
            virtual_interlining: parent.virtual_interlining,
            consolidate_ticket: parent.consolidate_ticket,
            excluded_carriers: parent.excluded_carriers.iter().cloned().collect(),
        }
    }

    pub fn currency(mut self, code: &str) -> Self {
        self.currency = CurrencyCode(code.trim().to_ascii_uppercase());
        self
    }

    pub fn date_format(mut self, format: DateFormat) -> Self {
        self.date_format = format;
        self
    }

    pub fn booking_enabled(mut self, enabled: bool) -> Self {
        self.booking_enabled = enabled;
        self
    }

    pub fn markup(mut self, markup: bool, by_itinerary: bool) -> Self {
        self.markup = markup;
        self.markup_by_itinerary = by_itinerary;
        self
    }

    pub fn branded_fares(mut self, enabled: bool) -> Self {
        self.branded_fares = enabled;
        self
    }

    pub fn virtual_interlining(mut self, enabled: bool) -> Self {
        self.virtual_interlining = enabled;
        self
    }

    pub fn consolidate_ticket(mut self, enabled: bool) -> Self {
        self.consolidate_ticket = enabled;
        self
    }

    pub fn exclude_carrier(mut self, carrier: &str) -> Self {
        self.excluded_carriers.push(carrier.trim().to_ascii_uppercase());
        self
    }

    /// Validate and build.
    pub fn build(self) -> DomainResult<ConfigTemplate> {
        let currency = CurrencyCode::parse(self.currency.as_str())?;
        for carrier in &self.excluded_carriers {
            if carrier.len() != 2 || !carrier.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(DomainError::validation(
                    "exclude_carriers",
                    codes::CARRIER,
                    format!("carrier code '{carrier}' is invalid."),
                ));
            }
        }
        Ok(ConfigTemplate {
            currency,
            ..self.snapshot()
        })
    }

    // Copies of an already valid parent need no re-validation.
    fn snapshot(self) -> ConfigTemplate {
        ConfigTemplate {
            currency: self.currency,
            date_format: self.date_format,
            booking_enabled: self.booking_enabled,
            markup: self.markup,
            markup_by_itinerary: self.markup_by_itinerary,
            branded_fares: self.branded_fares,
            virtual_interlining: self.virtual_interlining,
            consolidate_ticket: self.consolidate_ticket,
            excluded_carriers: self.excluded_carriers.into_iter().collect(),
        }
    }
}
