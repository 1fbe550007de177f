mod common;

use chrono::Duration;
use proptest::prelude::*;

use common::{World, changed_users, new_agency, new_user};
use tripdesk_auth::Actor;
use tripdesk_core::{DataSourceId, DomainError, UserId};
use tripdesk_infra::requests::{
    AgencyUpdate, BulkUsers, DataSourceBinding, GeneralInfo, NewDataSource, TeamUpdate, Tenant,
    UserUpdate,
};
use tripdesk_tenancy::{ConfigTemplate, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Config inheritance
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn team_template_is_isolated_from_later_agency_edits() {
    let w = World::new();
    let usd = ConfigTemplate::builder().currency("USD").build().unwrap();
    let agency = w.agency("Globe", Some(usd));
    let team = w.team_with(agency, "Ops", None, &[]);

    w.graph
        .update_general_info(
            &w.root,
            Tenant::Agency(agency),
            GeneralInfo {
                name: "Globe".into(),
                currency: "EUR".into(),
                date_format: "UK".into(),
            },
            w.now,
        )
        .unwrap();

    let snap = w.snapshot();
    assert_eq!(snap.agency(agency).unwrap().config.as_ref().unwrap().currency.as_str(), "EUR");
    assert_eq!(snap.team(team).unwrap().config.currency.as_str(), "USD");
}

#[test]
fn new_user_inherits_the_nearest_template() {
    let w = World::new();
    let gbp = ConfigTemplate::builder().currency("GBP").build().unwrap();
    let agency = w.agency("Globe", Some(gbp));
    let team = w.team_with(agency, "Ops", None, &[]);
    w.graph
        .update_general_info(
            &w.root,
            Tenant::Team(team),
            GeneralInfo {
                name: "Ops".into(),
                currency: "JPY".into(),
                date_format: "USA".into(),
            },
            w.now,
        )
        .unwrap();

    let in_team = w
        .graph
        .create_user(&w.root, new_user("t@globe.io", Some(team), None), w.now)
        .unwrap();
    let in_agency = w.agent("a@globe.io", Some(agency));
    assert_eq!(in_team.config.currency.as_str(), "JPY");
    assert_eq!(w.user(in_agency).config.currency.as_str(), "GBP");
}

#[test]
fn invalid_display_settings_change_nothing() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let before = w.snapshot();
    let err = w
        .graph
        .update_general_info(
            &w.root,
            Tenant::Agency(agency),
            GeneralInfo {
                name: "Renamed".into(),
                currency: "EUR".into(),
                date_format: "ISO".into(),
            },
            w.now,
        )
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert_eq!(w.snapshot(), before);
}

// ─────────────────────────────────────────────────────────────────────────────
// Teams and membership
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn create_team_promotes_the_lead_and_attaches_members() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let lead = w.agent("lead@globe.io", Some(agency));
    let a = w.agent("a@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", Some(lead), &[a, lead]);

    assert_eq!(w.user(lead).role(), Role::TeamLead { team });
    assert_eq!(w.user(a).team(), Some(team));
    let detail = w.graph.team_detail(&w.root, team).unwrap();
    assert_eq!(detail.admin, Some(lead));
    assert_eq!(detail.members, vec![a]);
}

#[test]
fn lead_from_another_agency_is_rejected() {
    let w = World::new();
    let globe = w.agency("Globe", None);
    let other = w.agency("Other", None);
    let outsider = w.agent("x@other.io", Some(other));
    let before = w.snapshot();

    let err = w
        .graph
        .create_team(
            &w.root,
            tripdesk_infra::requests::NewTeam {
                name: "Ops".into(),
                agency: globe,
                admin: Some(outsider),
                is_booking: false,
                members: vec![],
            },
            w.now,
        )
        .unwrap_err();
    assert_eq!(err.validation_code(), Some(11));
    assert_eq!(w.snapshot(), before);
}

#[test]
fn empty_team_name_is_rejected() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let err = w
        .graph
        .create_team(
            &w.root,
            tripdesk_infra::requests::NewTeam {
                name: "  ".into(),
                agency,
                admin: None,
                is_booking: false,
                members: vec![],
            },
            w.now,
        )
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[test]
fn membership_update_is_a_full_replace() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let [a, b, c, d, bystander] =
        ["a", "b", "c", "d", "e"].map(|n| w.agent(&format!("{n}@globe.io"), Some(agency)));
    let team = w.team_with(agency, "Ops", None, &[a, b, c]);
    let before = w.snapshot();

    let later = w.now + Duration::minutes(5);
    w.graph
        .update_team(
            &w.root,
            team,
            TeamUpdate {
                name: "Ops".into(),
                admin: None,
                is_booking: true,
                members: vec![b, d],
            },
            later,
        )
        .unwrap();

    let after = w.snapshot();
    assert_eq!(after.user(a).unwrap().team(), None);
    assert_eq!(after.user(c).unwrap().team(), None);
    assert_eq!(after.user(b).unwrap().team(), Some(team));
    assert_eq!(after.user(d).unwrap().team(), Some(team));

    let mut changed = changed_users(&before, &after);
    changed.sort();
    let mut expected = vec![a, c, d];
    expected.sort();
    assert_eq!(changed, expected);
    assert_eq!(after.user(bystander).unwrap(), before.user(bystander).unwrap());
    assert_eq!(after.user(a).unwrap().updated_at, later);
}

#[test]
fn replacing_the_lead_demotes_the_prior_one() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let old = w.agent("old@globe.io", Some(agency));
    let new = w.agent("new@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", Some(old), &[]);

    w.graph
        .update_team(
            &w.root,
            team,
            TeamUpdate {
                name: "Ops".into(),
                admin: Some(new),
                is_booking: false,
                members: vec![],
            },
            w.now,
        )
        .unwrap();

    let old = w.user(old);
    assert_eq!(old.role(), Role::Agent);
    assert_eq!(old.team(), None);
    assert_eq!(old.agency(), Some(agency));
    assert_eq!(w.user(new).role(), Role::TeamLead { team });
    assert_eq!(w.team(team).admin, Some(new));
}

#[test]
fn unknown_member_aborts_the_whole_update() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let a = w.agent("a@globe.io", Some(agency));
    let lead = w.agent("lead@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", Some(lead), &[a]);
    let before = w.snapshot();

    let err = w
        .graph
        .update_team(
            &w.root,
            team,
            TeamUpdate {
                name: "Renamed".into(),
                admin: None,
                is_booking: false,
                members: vec![UserId::new()],
            },
            w.now,
        )
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(w.snapshot(), before);
}

#[test]
fn team_lead_can_move_to_another_team() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let lead = w.agent("lead@globe.io", Some(agency));
    let first = w.team_with(agency, "First", Some(lead), &[]);
    let second = w.team_with(agency, "Second", Some(lead), &[]);

    assert_eq!(w.user(lead).role(), Role::TeamLead { team: second });
    assert_eq!(w.team(first).admin, None);
}

#[test]
fn delete_team_detaches_everyone() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let lead = w.agent("lead@globe.io", Some(agency));
    let a = w.agent("a@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", Some(lead), &[a]);

    w.graph.delete_team(&w.root, team, w.now).unwrap();

    let snap = w.snapshot();
    assert!(!snap.teams.contains(team));
    assert_eq!(snap.user(lead).unwrap().role(), Role::Agent);
    assert!(snap.users.iter().all(|u| u.team() != Some(team)));
}

#[test]
fn archiving_a_team_leaves_users_alone() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let a = w.agent("a@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", None, &[a]);

    w.graph.archive_team(&w.root, team, w.now).unwrap();
    assert!(!w.team(team).is_active);
    assert!(w.user(a).is_active);

    w.graph.reactivate_team(&w.root, team, w.now).unwrap();
    assert!(w.team(team).is_active);
}

#[test]
fn list_teams_is_scoped_and_filtered() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let other = w.agency("Other", None);
    w.team_with(globe, "Sales North", None, &[]);
    w.team_with(globe, "Ops", None, &[]);
    w.team_with(other, "Sales South", None, &[]);

    let admin = w.actor(admin);
    let names: Vec<_> = w
        .graph
        .list_teams(&admin, None, None)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Ops", "Sales North"]);

    let sales = w.graph.list_teams(&w.root, None, Some("sales")).unwrap();
    assert_eq!(sales.len(), 2);
}

#[test]
fn available_agents_are_teamless_and_active() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let free = w.agent("free@globe.io", Some(agency));
    let busy = w.agent("busy@globe.io", Some(agency));
    let off = w.agent("off@globe.io", Some(agency));
    w.team_with(agency, "Ops", None, &[busy]);
    w.graph.toggle_user_active(&w.root, off, w.now).unwrap();

    // Any tier may list candidates under an explicit agency.
    let agent = w.actor(busy);
    let ids: Vec<_> = w
        .graph
        .list_available_agents(&agent, agency)
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![free]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn agency_admin_is_confined_to_its_agency() {
    let w = World::new();
    let (x, admin) = w.administered_agency("Xeno");
    let z = w.agency("Zulu", None);
    let own = w.team_with(x, "Own", None, &[]);
    let foreign = w.team_with(z, "Foreign", None, &[]);
    let admin = w.actor(admin);

    let update = |name: &str| TeamUpdate {
        name: name.into(),
        admin: None,
        is_booking: false,
        members: vec![],
    };

    let err = w
        .graph
        .update_team(&admin, foreign, update("Taken"), w.now)
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
    assert_eq!(w.team(foreign).name, "Foreign");

    w.graph.update_team(&admin, own, update("Renamed"), w.now).unwrap();
    assert_eq!(w.team(own).name, "Renamed");
}

#[test]
fn agents_cannot_create_users() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let agent = w.actor(w.agent("a@globe.io", Some(agency)));
    let err = w
        .graph
        .create_user(&agent, new_user("b@globe.io", None, None), w.now)
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
}

#[test]
fn team_lead_creates_users_inside_its_team() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let lead = w.agent("lead@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", Some(lead), &[]);
    let lead = w.actor(lead);

    let created = w
        .graph
        .create_user(&lead, new_user("new@globe.io", None, None), w.now)
        .unwrap();
    assert_eq!(created.role(), Role::Agent);
    assert_eq!(created.agency(), Some(agency));
    assert_eq!(created.team(), Some(team));

    let members = w.graph.list_team_members(&lead, team).unwrap();
    assert_eq!(members.len(), 1);
}

#[test]
fn agency_admin_places_users_in_its_agency_regardless_of_request() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let other = w.agency("Other", None);
    let admin = w.actor(admin);

    let created = w
        .graph
        .create_user(&admin, new_user("n@globe.io", None, Some(other)), w.now)
        .unwrap();
    assert_eq!(created.agency(), Some(globe));
}

#[test]
fn team_lead_cannot_pull_members_from_another_team() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let lead = w.agent("lead@globe.io", Some(agency));
    let taken = w.agent("taken@globe.io", Some(agency));
    let free = w.agent("free@globe.io", Some(agency));
    let own = w.team_with(agency, "Own", Some(lead), &[]);
    let other = w.team_with(agency, "Other", None, &[taken]);
    let actor = w.actor(lead);
    let before = w.snapshot();

    let update = |members: Vec<UserId>| TeamUpdate {
        name: "Own".into(),
        admin: Some(lead),
        is_booking: true,
        members,
    };
    let err = w
        .graph
        .update_team(&actor, own, update(vec![taken]), w.now)
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
    assert_eq!(w.snapshot(), before);
    assert_eq!(w.user(taken).team(), Some(other));

    w.graph.update_team(&actor, own, update(vec![free]), w.now).unwrap();
    assert_eq!(w.user(free).team(), Some(own));
    assert_eq!(w.user(lead).role(), Role::TeamLead { team: own });
}

#[test]
fn agency_admin_cannot_pull_in_unattached_users() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let team = w.team_with(globe, "Ops", None, &[]);
    let stranger = w.register("stranger@example.com");
    let actor = w.actor(admin);
    let before = w.snapshot();

    let err = w
        .graph
        .update_team(
            &actor,
            team,
            TeamUpdate {
                name: "Ops".into(),
                admin: None,
                is_booking: true,
                members: vec![stranger],
            },
            w.now,
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));

    let err = w
        .graph
        .update_agency(
            &actor,
            globe,
            AgencyUpdate {
                name: "Globe".into(),
                api_username: "globe-api".into(),
                api_password: "provider-pw".into(),
                features: Default::default(),
                is_iframe: false,
                admin: Some(stranger),
                data_sources: None,
            },
            w.now,
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
    assert_eq!(w.snapshot(), before);
    assert_eq!(w.user(stranger).agency(), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn bulk_create_is_all_or_nothing() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    w.agent("taken@globe.io", Some(agency));
    let before = w.snapshot();

    let err = w
        .graph
        .bulk_create_users(
            &w.root,
            BulkUsers {
                emails: vec!["one@globe.io".into(), "taken@globe.io".into()],
                password: common::PASSWORD.into(),
                is_active: false,
                team: None,
                agency: Some(agency),
            },
            w.now,
        )
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(w.snapshot(), before);

    let created = w
        .graph
        .bulk_create_users(
            &w.root,
            BulkUsers {
                emails: vec!["one@globe.io".into(), "two@globe.io".into()],
                password: common::PASSWORD.into(),
                is_active: false,
                team: None,
                agency: Some(agency),
            },
            w.now,
        )
        .unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|u| !u.is_active && u.agency() == Some(agency)));
}

#[test]
fn users_cannot_toggle_themselves() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let a = w.agent("a@globe.io", Some(agency));
    let err = w.graph.toggle_user_active(&w.actor(a), a, w.now).unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));

    assert!(!w.graph.toggle_user_active(&w.root, a, w.now).unwrap());
    assert!(w.graph.toggle_user_active(&w.root, a, w.now).unwrap());
}

#[test]
fn agent_updates_own_profile_but_not_active_flag() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let a = w.agent("a@globe.io", Some(agency));
    let me = w.actor(a);
    let mut update = UserUpdate {
        email: "a@globe.io".into(),
        first_name: "Ann".into(),
        last_name: "Smith".into(),
        phone: Some("+1 555 0100".into()),
        is_active: true,
        team: None,
    };

    let user = w.graph.update_user(&me, a, update.clone(), w.now).unwrap();
    assert_eq!(user.profile.first_name, "Ann");

    update.is_active = false;
    let err = w.graph.update_user(&me, a, update, w.now).unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
}

#[test]
fn update_user_moves_an_agent_between_teams() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let a = w.agent("a@globe.io", Some(agency));
    let first = w.team_with(agency, "First", None, &[a]);
    let second = w.team_with(agency, "Second", None, &[]);

    let user = w
        .graph
        .update_user(
            &w.root,
            a,
            UserUpdate {
                email: "a@globe.io".into(),
                first_name: "Test".into(),
                last_name: "User".into(),
                phone: None,
                is_active: true,
                team: Some(second),
            },
            w.now,
        )
        .unwrap();
    assert_eq!(user.team(), Some(second));
    assert!(w.graph.list_team_members(&w.root, first).unwrap().is_empty());
}

#[test]
fn user_detail_shows_settings_only_to_the_owner() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let a = w.agent("a@globe.io", Some(globe));
    let b = w.agent("b@globe.io", Some(globe));

    let own = w.graph.user_detail(&w.actor(a), a).unwrap();
    assert_eq!(own.settings.map(|s| s.currency), Some("USD".to_string()));

    let seen = w.graph.user_detail(&w.actor(admin), a).unwrap();
    assert_eq!(seen.user.email, "a@globe.io");
    assert!(seen.settings.is_none());

    let err = w.graph.user_detail(&w.actor(b), a).unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
}

#[test]
fn list_users_is_scoped_and_filtered() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let lead = w.agent("lead@globe.io", Some(globe));
    let ann = w.agent("ann@globe.io", Some(globe));
    w.agent("bob@globe.io", Some(globe));
    w.agent("x@zulu.io", None);
    w.team_with(globe, "Ops", Some(lead), &[ann]);

    let emails = |actor: &Actor, keyword: Option<&str>| -> Vec<String> {
        w.graph
            .list_users(actor, keyword)
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect()
    };
    assert_eq!(
        emails(&w.actor(admin), None),
        vec!["admin@globe.io", "ann@globe.io", "bob@globe.io", "lead@globe.io"]
    );
    assert_eq!(emails(&w.actor(lead), None), vec!["ann@globe.io", "lead@globe.io"]);
    assert_eq!(emails(&w.root, Some("ANN")), vec!["ann@globe.io"]);
    assert!(w.graph.list_users(&w.actor(ann), None).is_err());
}

#[test]
fn email_check_reflects_taken_addresses() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let admin = w.actor(admin);
    w.agent("a@globe.io", Some(globe));

    assert!(!w.graph.email_available(&admin, "A@Globe.io").unwrap());
    assert!(w.graph.email_available(&admin, "new@globe.io").unwrap());
    let err = w.graph.email_available(&admin, "not-an-email").unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let agent = w.actor(w.agent("b@globe.io", Some(globe)));
    let err = w.graph.email_available(&agent, "new@globe.io").unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
}

#[test]
fn settings_reads_follow_the_gate() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let team = w.team_with(globe, "Ops", None, &[]);
    let a = w.agent("a@globe.io", Some(globe));
    let me = w.actor(a);

    let basic = w.graph.basic_info(&me, a).unwrap();
    assert_eq!(basic.email, "a@globe.io");
    assert_eq!(basic.currency, "USD");
    assert!(w.graph.basic_info(&me, admin).is_err());

    let info = w.graph.general_info(&w.actor(admin), Tenant::Team(team)).unwrap();
    assert_eq!(info.name, "Ops");
    assert_eq!(info.currency, "USD");

    let err = w.graph.general_info(&me, Tenant::Agency(globe)).unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
}

#[test]
fn admin_candidates_depend_on_the_actor() {
    let w = World::new();
    let (globe, admin) = w.administered_agency("Globe");
    let a = w.agent("a@globe.io", Some(globe));
    let stranger = w.register("stranger@example.com");

    let ids = |actor: &Actor| -> Vec<UserId> {
        w.graph
            .list_available_admins(actor, globe)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect()
    };
    assert_eq!(ids(&w.actor(admin)), vec![a]);
    assert_eq!(ids(&w.root), vec![a, stranger]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Agencies and data sources
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn archiving_an_agency_cascades_but_reactivation_does_not() {
    let w = World::new();
    let agency = w.agency("Globe", None);
    let a = w.agent("a@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", None, &[a]);
    let outsider = w.agent("x@else.io", None);

    w.graph.archive_agency(&w.root, agency, w.now).unwrap();
    let snap = w.snapshot();
    assert!(!snap.agency(agency).unwrap().is_active);
    assert!(!snap.user(a).unwrap().is_active);
    assert!(!snap.team(team).unwrap().is_active);
    assert!(snap.user(outsider).unwrap().is_active);

    w.graph.reactivate_agency(&w.root, agency, w.now).unwrap();
    let snap = w.snapshot();
    assert!(snap.agency(agency).unwrap().is_active);
    assert!(!snap.user(a).unwrap().is_active);
    assert!(!snap.team(team).unwrap().is_active);
}

#[test]
fn deleting_an_agency_nulls_every_reference() {
    let w = World::new();
    let (agency, admin) = w.administered_agency("Globe");
    let a = w.agent("a@globe.io", Some(agency));
    let team = w.team_with(agency, "Ops", None, &[a]);
    let slot = w
        .graph
        .create_data_source(
            &w.root,
            NewDataSource {
                name: String::new(),
                pcc: "ABC1".into(),
                provider: "1G".into(),
            },
            w.now,
        )
        .unwrap();
    let mut update = AgencyUpdate {
        name: "Globe".into(),
        api_username: "globe-api".into(),
        api_password: "provider-pw".into(),
        features: Default::default(),
        is_iframe: false,
        admin: Some(admin),
        data_sources: Some(vec![DataSourceBinding { id: slot.id, pcc: None }]),
    };
    w.graph.update_agency(&w.root, agency, update.clone(), w.now).unwrap();

    w.graph.delete_agency(&w.root, agency, w.now).unwrap();
    let snap = w.snapshot();
    assert!(!snap.agencies.contains(agency));
    assert_eq!(snap.team(team).unwrap().agency, None);
    assert_eq!(snap.user(a).unwrap().agency(), None);
    assert_eq!(snap.user(a).unwrap().team(), Some(team));
    assert_eq!(snap.user(admin).unwrap().role(), Role::Agent);
    assert_eq!(snap.user(admin).unwrap().agency(), None);
    assert_eq!(snap.data_source(slot.id).unwrap().agency, None);

    update.data_sources = None;
    let err = w.graph.update_agency(&w.root, agency, update, w.now).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn agency_detail_lists_bound_slots_and_head_count() {
    let w = World::new();
    let slot = w
        .graph
        .create_data_source(
            &w.root,
            NewDataSource {
                name: String::new(),
                pcc: "LON1".into(),
                provider: "1G".into(),
            },
            w.now,
        )
        .unwrap();
    let mut request = new_agency("Globe", None);
    request.data_sources = vec![DataSourceBinding { id: slot.id, pcc: None }];
    let globe = w.graph.create_agency(&w.root, request, w.now).unwrap().id;
    w.agent("a@globe.io", Some(globe));

    let detail = w.graph.agency_detail(&w.root, globe).unwrap();
    assert_eq!(detail.agency.name, "Globe");
    assert_eq!(detail.api_username, "globe-api");
    assert_eq!(detail.users, 1);
    let slots: Vec<_> = detail.data_sources.iter().map(|d| d.id).collect();
    assert_eq!(slots, vec![slot.id]);

    let (_, outsider) = w.administered_agency("Zulu");
    let err = w.graph.agency_detail(&w.actor(outsider), globe).unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
}

#[test]
fn data_source_owned_elsewhere_is_a_conflict() {
    let w = World::new();
    let slot = w
        .graph
        .create_data_source(
            &w.root,
            NewDataSource {
                name: "amadeus".into(),
                pcc: "NYC1".into(),
                provider: "1A".into(),
            },
            w.now,
        )
        .unwrap();
    let mut first = new_agency("First", None);
    first.data_sources = vec![DataSourceBinding { id: slot.id, pcc: Some("NYC2".into()) }];
    let first = w.graph.create_agency(&w.root, first, w.now).unwrap();
    assert_eq!(w.snapshot().data_source(slot.id).unwrap().pcc, "NYC2");

    let before = w.snapshot();
    let mut second = new_agency("Second", None);
    second.data_sources = vec![DataSourceBinding { id: slot.id, pcc: None }];
    let err = w.graph.create_agency(&w.root, second, w.now).unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(w.snapshot(), before);

    let available = w.graph.available_data_sources(&w.root, first.id).unwrap();
    assert_eq!(available.len(), 1);
    assert!(w.graph.unbound_data_sources(&w.root).unwrap().is_empty());
}

#[test]
fn unknown_data_source_aborts_agency_creation() {
    let w = World::new();
    let mut request = new_agency("Globe", None);
    request.data_sources = vec![DataSourceBinding { id: DataSourceId::new(), pcc: None }];
    let err = w.graph.create_agency(&w.root, request, w.now).unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(w.snapshot().agencies.is_empty());
}

#[test]
fn only_superusers_rebind_data_sources() {
    let w = World::new();
    let (agency, admin) = w.administered_agency("Globe");
    let admin = w.actor(admin);
    let update = AgencyUpdate {
        name: "Globe".into(),
        api_username: "globe-api".into(),
        api_password: "provider-pw".into(),
        features: Default::default(),
        is_iframe: true,
        admin: Some(admin.user_id),
        data_sources: Some(vec![]),
    };
    let err = w.graph.update_agency(&admin, agency, update.clone(), w.now).unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));

    let renamed = w
        .graph
        .update_agency(&admin, agency, AgencyUpdate { data_sources: None, ..update }, w.now)
        .unwrap();
    assert!(renamed.is_iframe);
    assert!(w.graph.list_agencies(&admin, None).is_err());
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

    /// Whatever the old and new member sets, the team ends up with exactly the
    /// new set and no user outside both sets is touched.
    #[test]
    fn membership_replace_touches_only_old_and_new_members(
        old in proptest::collection::vec(any::<bool>(), 6),
        new in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let w = World::new();
        let agency = w.agency("Globe", None);
        let users: Vec<UserId> = (0..6)
            .map(|i| w.agent(&format!("u{i}@globe.io"), Some(agency)))
            .collect();
        let pick = |mask: &[bool]| -> Vec<UserId> {
            users.iter().zip(mask).filter(|(_, on)| **on).map(|(id, _)| *id).collect()
        };
        let old_members = pick(&old);
        let new_members = pick(&new);
        let team = w.team_with(agency, "Ops", None, &old_members);
        let before = w.snapshot();

        w.graph.update_team(&w.root, team, TeamUpdate {
            name: "Ops".into(),
            admin: None,
            is_booking: true,
            members: new_members.clone(),
        }, w.now).unwrap();

        let after = w.snapshot();
        let mut members = after.team_member_ids(team);
        members.sort();
        let mut expected = new_members.clone();
        expected.sort();
        prop_assert_eq!(members, expected);

        for id in changed_users(&before, &after) {
            prop_assert!(old_members.contains(&id) != new_members.contains(&id));
        }
    }
}
