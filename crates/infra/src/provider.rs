//! Booking-provider context: the credentials and search defaults a proxy
//! attaches to every outbound search/price/book request of a user.

use serde::Serialize;
use serde_json::{Map, Value, json};

use tripdesk_core::{DomainError, DomainResult, UserId};
use tripdesk_tenancy::user::Endpoint;
use tripdesk_tenancy::{ApiCredentials, DataSource};

use crate::directory::Tables;

/// Validation code when the user is not attached to an agency.
pub const NO_AGENCY_CODE: u16 = 30;

/// One active credential slot of the user's agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCredential {
    pub pcc: String,
    pub provider: String,
    pub data_source: String,
}

impl From<&DataSource> for SourceCredential {
    fn from(source: &DataSource) -> Self {
        Self {
            pcc: source.pcc.clone(),
            provider: source.provider.to_string(),
            data_source: source.data_source_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingContext {
    /// Agency-level API pair, sent as request authentication.
    pub api_credentials: ApiCredentials,
    pub sources: Vec<SourceCredential>,
    pub currency: String,
    pub excluded_carriers: Vec<String>,
    pub branded_fares: bool,
    pub markup: bool,
    pub markup_by_itinerary: bool,
    pub search_endpoint: Endpoint,
    pub booking_endpoint: Endpoint,
    pub user_email: String,
    /// Ticketing queue of the agency's first active slot.
    pub queue: Option<String>,
}

impl BookingContext {
    /// Overlay the user's parameters onto a JSON search request.
    ///
    /// Credentials, carriers, markup and the user email always win. The
    /// caller's `currency`, `alliance`, `refundable`, `permitted_carriers` and
    /// `prohibit_unbundled_fares` are kept when present; otherwise defaults are
    /// filled in. A non-object `request` is replaced by an object.
    pub fn merge_into(&self, request: Value) -> Value {
        let mut map = match request {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let defaults = [
            ("currency", json!(self.currency)),
            ("alliance", json!("")),
            ("refundable", json!(false)),
            ("permitted_carriers", json!([])),
            ("prohibit_unbundled_fares", json!(false)),
        ];
        for (key, value) in defaults {
            map.entry(key).or_insert(value);
        }

        map.insert("credentials".into(), json!(self.sources));
        map.insert("exclude_carriers".into(), json!(self.excluded_carriers));
        map.insert("search_brands".into(), json!(self.branded_fares));
        map.insert("user_email".into(), json!(self.user_email));
        map.insert("markup".into(), json!(self.markup));
        map.insert("markup_by_itinerary".into(), json!(self.markup_by_itinerary));
        Value::Object(map)
    }
}

/// Build the context of `user_id` from its agency's active slots and its own
/// template.
pub fn resolve(tables: &Tables, user_id: UserId) -> DomainResult<BookingContext> {
    let user = tables.user(user_id)?;
    let agency_id = user.agency().ok_or_else(|| {
        DomainError::validation(
            "agency",
            NO_AGENCY_CODE,
            "You are not a member of any agency.",
        )
    })?;
    let agency = tables.agency(agency_id)?;

    let active = tables
        .data_sources
        .filter(|ds| ds.agency == Some(agency_id) && ds.active);

    Ok(BookingContext {
        api_credentials: agency.api_credentials.clone(),
        sources: active.iter().copied().map(SourceCredential::from).collect(),
        currency: user.config.currency.as_str().to_string(),
        excluded_carriers: user.config.excluded_carriers.iter().cloned().collect(),
        branded_fares: user.config.branded_fares,
        markup: user.config.markup,
        markup_by_itinerary: user.config.markup_by_itinerary,
        search_endpoint: user.search_endpoint,
        booking_endpoint: user.booking_endpoint,
        user_email: user.email().to_string(),
        queue: active.first().map(|ds| ds.queue.clone()),
    })
}
