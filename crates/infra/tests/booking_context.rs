mod common;

use serde_json::json;

use common::{World, new_agency};
use tripdesk_infra::requests::{DataSourceBinding, NewDataSource};
use tripdesk_tenancy::ConfigTemplate;

fn slot(w: &World, name: &str, pcc: &str, provider: &str) -> tripdesk_core::DataSourceId {
    w.graph
        .create_data_source(
            &w.root,
            NewDataSource {
                name: name.into(),
                pcc: pcc.into(),
                provider: provider.into(),
            },
            w.now,
        )
        .unwrap()
        .id
}

#[test]
fn context_carries_agency_credentials_and_user_defaults() {
    let w = World::new();
    let amadeus = slot(&w, "", "NYC1A", "1A");
    let galileo = slot(&w, "gal", "LON1G", "1G");
    let config = ConfigTemplate::builder()
        .currency("EUR")
        .exclude_carrier("AA")
        .markup(true, false)
        .build()
        .unwrap();

    let mut request = new_agency("Globe", Some(config));
    request.data_sources = vec![
        DataSourceBinding { id: amadeus, pcc: None },
        DataSourceBinding { id: galileo, pcc: None },
    ];
    let agency = w.graph.create_agency(&w.root, request, w.now).unwrap();
    let user = w.agent("a@globe.io", Some(agency.id));

    let ctx = w.graph.booking_context(user).unwrap();
    assert_eq!(ctx.api_credentials.username, "globe-api");
    assert_eq!(ctx.currency, "EUR");
    assert_eq!(ctx.excluded_carriers, vec!["AA".to_string()]);
    assert!(ctx.markup);
    assert_eq!(ctx.user_email, "a@globe.io");
    assert_eq!(ctx.queue.as_deref(), Some("01"));

    let mut sources: Vec<_> = ctx
        .sources
        .iter()
        .map(|s| (s.provider.as_str(), s.data_source.as_str()))
        .collect();
    sources.sort();
    assert_eq!(sources, vec![("1A", "amadeus"), ("1G", "gal")]);

    let merged = ctx.merge_into(json!({"currency": "USD"}));
    assert_eq!(merged["currency"], "USD");
    assert_eq!(merged["markup"], true);
    assert_eq!(merged["credentials"].as_array().map(Vec::len), Some(2));
}

#[test]
fn user_without_agency_has_no_context() {
    let w = World::new();
    let loner = w.register("solo@example.com");
    let err = w.graph.booking_context(loner).unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}
