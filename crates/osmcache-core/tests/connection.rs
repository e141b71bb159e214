mod common;

use chrono::NaiveDate;
use serde_json::json;

use osmcache_core::api::endpoints;
use osmcache_core::models::{
    AttendanceStatus, BadgeIdv, BadgeType, MemberField, MemberKey, SectionType,
};
use osmcache_core::{Connection, OsmError, Presence};

use common::{config, cubs_script, form_value, logged_in, ScriptedTransport};

const JO: MemberKey = MemberKey { section: 100, member: 7 };

#[tokio::test]
async fn test_login_sends_credentials_on_later_calls() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;
    assert_eq!(connection.email(), Some("leader@example.com"));

    connection.sections().await.unwrap();
    let form = transport.last_form(endpoints::ROLES).unwrap();
    assert_eq!(form_value(&form, "apiid"), Some("42"));
    assert_eq!(form_value(&form, "token"), Some("app-token"));
    assert_eq!(form_value(&form, "userid"), Some("12"));
    assert_eq!(form_value(&form, "secret"), Some("user-secret"));
}

#[tokio::test]
async fn test_rejected_login_keeps_remote_error() {
    let transport = ScriptedTransport::new();
    transport.respond(endpoints::AUTHORISE, json!({"error": "Incorrect password"}));
    let mut connection = Connection::new(&config(), Box::new(transport.clone())).unwrap();

    assert!(!connection.login("leader@example.com", "wrong").await.unwrap());
    assert!(!connection.is_authenticated());
    assert_eq!(connection.last_error().unwrap().message, "Incorrect password");
}

#[tokio::test]
async fn test_reads_before_login_make_no_calls() {
    let transport = cubs_script();
    let mut connection = Connection::new(&config(), Box::new(transport.clone())).unwrap();

    let err = connection.sections().await.unwrap_err();
    assert!(matches!(err, OsmError::NotAuthenticated));
    assert_eq!(transport.total(), 0);
}

#[tokio::test]
async fn test_each_recipe_runs_once() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;

    for _ in 0..3 {
        let sections = connection.sections().await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_type.get(), Some(&SectionType::Cubs));
        assert_eq!(connection.members(100, Some(1)).await.unwrap().len(), 2);
    }
    assert_eq!(transport.count(endpoints::ROLES), 1);
    assert_eq!(transport.count(endpoints::MEMBER_LIST), 1);

    // The member list is sent with the section type from the roles call
    let form = transport.last_form(endpoints::MEMBER_LIST).unwrap();
    assert_eq!(form_value(&form, "section"), Some("cubs"));
    assert_eq!(form_value(&form, "termid"), Some("1"));
}

#[tokio::test]
async fn test_members_share_identity_across_reads() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;

    let first = connection.members(100, Some(1)).await.unwrap()[0] as *const _;
    let again = connection.member(JO, MemberField::DateOfBirth).await.unwrap() as *const _;
    assert_eq!(first, again);
    // Date of birth came with the list, so no individual lookup was needed
    assert_eq!(transport.count(endpoints::INDIVIDUAL), 0);
}

#[tokio::test]
async fn test_denied_recipe_is_not_retried() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;

    // Patrols are unscripted, so the remote system answers null
    for _ in 0..2 {
        let patrols = connection.patrols(100).await.unwrap();
        let names: Vec<_> = patrols.iter().filter_map(|p| p.name.get().cloned()).collect();
        assert_eq!(names, vec!["Leaders", "Young Leaders"]);
    }
    assert_eq!(transport.count(endpoints::PATROLS), 1);
    assert!(connection.registry().section(100).unwrap().patrols.is_unavailable());

    connection.members(100, Some(1)).await.unwrap();
    for _ in 0..2 {
        let jo = connection.member(JO, MemberField::Started).await.unwrap();
        assert_eq!(jo.presence(MemberField::Started), Presence::Unavailable);
    }
    assert_eq!(transport.count(endpoints::INDIVIDUAL), 1);
}

#[tokio::test]
async fn test_individual_record_fills_in_once() {
    let transport = cubs_script();
    transport.respond(
        endpoints::INDIVIDUAL,
        json!({"ok": true, "data": {"scoutid": 7, "firstname": "Jo", "lastname": "Smith",
            "started": "2020-01-01", "startedsection": "2024-09-01"}}),
    );
    let mut connection = logged_in(&transport).await;
    connection.members(100, Some(1)).await.unwrap();

    let jo = connection.member(JO, MemberField::Started).await.unwrap();
    assert_eq!(jo.started.get(), NaiveDate::from_ymd_opt(2020, 1, 1).as_ref());
    let jo = connection.member(JO, MemberField::StartedSection).await.unwrap();
    assert_eq!(jo.started_section.get(), NaiveDate::from_ymd_opt(2024, 9, 1).as_ref());
    assert_eq!(transport.count(endpoints::INDIVIDUAL), 1);

    let form = transport.last_form(endpoints::INDIVIDUAL).unwrap();
    assert_eq!(form_value(&form, "scoutid"), Some("7"));
    assert_eq!(form_value(&form, "sectionid"), Some("100"));
}

#[tokio::test]
async fn test_conflicting_names_are_fatal() {
    let transport = cubs_script();
    transport.respond(
        endpoints::INDIVIDUAL,
        json!({"ok": true, "data": {"scoutid": 7, "firstname": "Jon", "lastname": "Smith"}}),
    );
    let mut connection = logged_in(&transport).await;
    connection.members(100, Some(1)).await.unwrap();

    let err = connection.member(JO, MemberField::Started).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, OsmError::Inconsistent { field: "first_name", .. }));
}

#[tokio::test]
async fn test_remote_session_end_clears_cache() {
    let transport = cubs_script();
    transport.respond(endpoints::PATROLS, json!({"error": "Not logged in"}));
    let mut connection = logged_in(&transport).await;
    connection.sections().await.unwrap();
    assert!(!connection.registry().is_empty());

    let err = connection.patrols(100).await.unwrap_err();
    assert!(matches!(err, OsmError::NotAuthenticated));
    assert!(!connection.is_authenticated());
    assert!(connection.registry().is_empty());
    assert_eq!(connection.last_error().unwrap().message, "Not logged in");
}

#[tokio::test]
async fn test_logout_clears_cache() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;
    connection.members(100, Some(1)).await.unwrap();

    connection.logout().await.unwrap();
    assert_eq!(transport.count(endpoints::LOGOUT), 1);
    assert!(!connection.is_authenticated());
    assert!(connection.registry().is_empty());
    assert!(matches!(
        connection.members(100, Some(1)).await,
        Err(OsmError::NotAuthenticated)
    ));

    // Logging in again starts from scratch
    assert!(connection.login("leader@example.com", "pw").await.unwrap());
    connection.sections().await.unwrap();
    assert_eq!(transport.count(endpoints::ROLES), 2);
}

#[tokio::test]
async fn test_login_keeps_chosen_section() {
    let transport = cubs_script();
    let mut connection = Connection::new(&config(), Box::new(transport.clone())).unwrap();
    connection.set_current_section(200);

    assert!(connection.login("leader@example.com", "pw").await.unwrap());
    assert_eq!(connection.current_section().await.unwrap(), Some(200));

    connection.logout().await.unwrap();
    assert!(connection.login("leader@example.com", "pw").await.unwrap());
    assert_eq!(connection.current_section().await.unwrap(), Some(100));
}

#[tokio::test]
async fn test_term_selection_from_cached_terms() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;

    let date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
    assert_eq!(connection.term_at(100, date).await.unwrap(), Some(1));
    // After the only term ends it is still the latest one started
    let later = NaiveDate::from_ymd_opt(2027, 2, 1).unwrap();
    assert_eq!(connection.term_at(100, later).await.unwrap(), Some(1));
    assert_eq!(transport.count(endpoints::TERMS), 1);
}

#[tokio::test]
async fn test_event_attendance_uses_event_term() {
    let transport = cubs_script();
    transport
        .respond(
            endpoints::EVENT_SUMMARY,
            json!({"items": [
                {"eventid": "55", "name": "Camp", "startdate": "2026-10-10",
                 "enddate": "2026-10-12", "cost": "-1"}
            ]}),
        )
        .respond(
            endpoints::ATTENDANCE,
            json!({"items": [
                {"scoutid": "7", "firstname": "Jo", "lastname": "Smith", "attending": "Yes",
                 "f_1": "Veggie"},
                {"scoutid": "8", "firstname": "Sam", "lastname": "Jones", "attending": "No"}
            ]}),
        );
    let mut connection = logged_in(&transport).await;

    let events = connection.events(100, Some(1)).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].cost.get().map(|c| c.to_string()), Some("TBA".to_string()));

    let attendance = connection.attendance(55).await.unwrap().unwrap();
    assert_eq!(attendance[&7].status, AttendanceStatus::Yes);
    assert_eq!(attendance[&7].columns.get("f_1").map(String::as_str), Some("Veggie"));

    let form = transport.last_form(endpoints::ATTENDANCE).unwrap();
    assert_eq!(form_value(&form, "termid"), Some("1"));
    assert_eq!(form_value(&form, "eventid"), Some("55"));

    connection.attendance(55).await.unwrap();
    assert_eq!(transport.count(endpoints::ATTENDANCE), 1);
}

#[tokio::test]
async fn test_requirement_status_for_member() {
    let transport = cubs_script();
    transport
        .respond(
            endpoints::BADGE_LIST,
            json!({"data": [
                {"badge_id": "93", "badge_version": "0", "name": "Outdoors", "type_id": "1"}
            ]}),
        )
        .respond(
            endpoints::BADGE_STRUCTURE,
            json!({
                "details": {"badge_id": "93", "badge_version": "0", "name": "Outdoors",
                 "type_id": 1},
                "requirements": [
                    {"field": "101", "name": "Camp", "tooltip": "Go camping", "module": "b"},
                    {"field": "102", "name": "Hike", "tooltip": "Go hiking", "module": "b"},
                    {"field": "103", "name": "Cook", "tooltip": "Cook a meal", "module": "b"}
                ]
            }),
        )
        .respond(
            endpoints::BADGE_RECORDS,
            json!({"items": [
                {"scoutid": "7", "firstname": "Jo", "lastname": "Smith", "completed": "0",
                 "awarded": "0", "_101": "yes", "_102": "done"}
            ]}),
        );
    let mut connection = logged_in(&transport).await;
    let outdoors = BadgeIdv::new(93, 0);

    let badges = connection.badges(100, Some(1), BadgeType::Challenge).await.unwrap();
    assert_eq!(badges.len(), 1);

    let report = connection.requirement_status(JO, Some(1), outdoors).await.unwrap();
    assert_eq!(report.len(), 3);
    assert!(report[0].met && report[1].met);
    // Two met in area b make the third optional for Cubs
    assert!(!report[2].met && report[2].skippable);

    connection.requirement_status(JO, Some(1), outdoors).await.unwrap();
    assert_eq!(transport.count(endpoints::BADGE_STRUCTURE), 1);
    assert_eq!(transport.count(endpoints::BADGE_RECORDS), 1);
}

#[tokio::test]
async fn test_requirement_status_without_section_type() {
    let transport = cubs_script();
    transport
        .respond(
            endpoints::ROLES,
            json!([{"sectionid": "100", "sectionname": "Red Cubs", "isDefault": "1"}]),
        )
        .respond(
            endpoints::BADGE_STRUCTURE,
            json!({
                "details": {"badge_id": "93", "badge_version": "0", "name": "Outdoors",
                 "type_id": 1},
                "requirements": [
                    {"field": "101", "name": "Camp", "tooltip": "Go camping", "module": "b"},
                    {"field": "102", "name": "Hike", "tooltip": "Go hiking", "module": "b"},
                    {"field": "103", "name": "Cook", "tooltip": "Cook a meal", "module": "b"}
                ]
            }),
        )
        .respond(
            endpoints::BADGE_RECORDS,
            json!({"items": [
                {"scoutid": "7", "firstname": "Jo", "lastname": "Smith", "completed": "0",
                 "awarded": "0", "_101": "yes", "_102": "done"}
            ]}),
        );
    let mut connection = logged_in(&transport).await;

    let report = connection
        .requirement_status(JO, Some(1), BadgeIdv::new(93, 0))
        .await
        .unwrap();
    assert_eq!(transport.count(endpoints::BADGE_STRUCTURE), 1);
    assert_eq!(report.len(), 3);
    assert!(report[0].met && report[1].met);
    // Without a section type there is no override to apply
    assert!(!report[2].met && !report[2].skippable);
    let form = transport.last_form(endpoints::BADGE_STRUCTURE).unwrap();
    assert_eq!(form_value(&form, "section"), None);
}

#[tokio::test]
async fn test_usage_counts_calls() {
    let transport = cubs_script();
    let mut connection = logged_in(&transport).await;
    connection.members(100, Some(1)).await.unwrap();

    assert_eq!(connection.usage().total_calls() as usize, transport.total());
    assert_eq!(connection.usage().get(endpoints::ROLES).count, 1);
}
