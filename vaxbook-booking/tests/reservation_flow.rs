use std::sync::Arc;

use vaxbook_booking::{BookingEngine, BookingError, Reservation, Session};
use vaxbook_core::{parse_date, Role};
use vaxbook_store::InMemoryStore;

fn engine() -> (BookingEngine, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::with_hash_iterations(1));
    (BookingEngine::new(store.clone(), store.clone()), store)
}

async fn logged_in(engine: &BookingEngine, role: Role, username: &str) -> Session {
    engine.register(role, username, "pw").await.unwrap();
    let mut session = Session::new();
    engine.login(&mut session, role, username, "pw").await.unwrap();
    session
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let (engine, store) = engine();

    let amy = logged_in(&engine, Role::Caregiver, "amy").await;
    engine.publish_availability(&amy, "03-15-2024").await.unwrap();
    assert_eq!(engine.increase_doses(&amy, "Moderna", 5).await.unwrap(), 5);

    let joe = logged_in(&engine, Role::Patient, "joe").await;
    let reservation = engine.reserve(&joe, "03-15-2024", "Moderna").await.unwrap();
    assert_eq!(
        reservation,
        Reservation { appointment_id: 1, caregiver: "amy".to_string() }
    );

    let sam = logged_in(&engine, Role::Patient, "sam").await;
    assert_eq!(
        engine.reserve(&sam, "03-15-2024", "Moderna").await.unwrap_err(),
        BookingError::NoCaregiverAvailable("03-15-2024".to_string())
    );

    // the slot is gone and exactly one appointment claims it
    assert!(store.slots().await.is_empty());
    let appointments = store.appointments().await;
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].patient, "joe");

    let joe_view = engine.list_appointments(&joe).await.unwrap();
    assert_eq!(joe_view.len(), 1);
    assert_eq!(joe_view[0].counterparty, "amy");
    assert_eq!(joe_view[0].vaccine, "Moderna");
    assert_eq!(joe_view[0].date, parse_date("03-15-2024").unwrap());

    let amy_view = engine.list_appointments(&amy).await.unwrap();
    assert_eq!(amy_view[0].counterparty, "joe");
    assert!(engine.list_appointments(&sam).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_least_username_wins() {
    let (engine, _store) = engine();

    for name in ["bob", "amy", "zoe"] {
        engine.register(Role::Caregiver, name, "pw").await.unwrap();
        engine.publish_availability_for(name, "03-15-2024").await.unwrap();
    }
    engine.increase_doses_by("Pfizer", 10).await.unwrap();
    engine.register(Role::Patient, "joe", "pw").await.unwrap();
    engine.register(Role::Patient, "sam", "pw").await.unwrap();

    let first = engine.reserve_for("joe", "03-15-2024", "Pfizer").await.unwrap();
    assert_eq!(first.caregiver, "amy");

    let second = engine.reserve_for("sam", "03-15-2024", "Pfizer").await.unwrap();
    assert_eq!(second.caregiver, "bob");
    assert_eq!(second.appointment_id, first.appointment_id + 1);
}

#[tokio::test]
async fn test_reserve_without_doses() {
    let (engine, store) = engine();
    engine.register(Role::Caregiver, "amy", "pw").await.unwrap();
    engine.register(Role::Patient, "joe", "pw").await.unwrap();
    engine.publish_availability_for("amy", "03-15-2024").await.unwrap();

    assert_eq!(
        engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap_err(),
        BookingError::NoDosesAvailable("Moderna".to_string())
    );

    // a vaccine row with zero doses is still unavailable
    engine.increase_doses_by("Moderna", 0).await.unwrap();
    assert_eq!(
        engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap_err(),
        BookingError::NoDosesAvailable("Moderna".to_string())
    );

    assert_eq!(store.slots().await.len(), 1);
    assert!(store.appointments().await.is_empty());
}

#[tokio::test]
async fn test_reserve_leaves_dose_count_unchanged() {
    let (engine, _store) = engine();
    for name in ["amy", "bob"] {
        engine.register(Role::Caregiver, name, "pw").await.unwrap();
        engine.publish_availability_for(name, "03-15-2024").await.unwrap();
    }
    engine.register(Role::Patient, "joe", "pw").await.unwrap();
    engine.increase_doses_by("Moderna", 1).await.unwrap();

    engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap();
    engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap();

    assert_eq!(engine.dose_count("Moderna").await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_consume_rolls_back_appointment() {
    let (engine, store) = engine();
    engine.register(Role::Caregiver, "amy", "pw").await.unwrap();
    engine.register(Role::Patient, "joe", "pw").await.unwrap();
    engine.publish_availability_for("amy", "03-15-2024").await.unwrap();
    engine.increase_doses_by("Moderna", 5).await.unwrap();

    store.fail_next_consume();
    let err = engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap_err();
    assert!(matches!(err, BookingError::StoreUnavailable(_)));
    assert!(err.is_fatal());

    assert!(store.appointments().await.is_empty());
    assert_eq!(
        store.slots().await,
        vec![("amy".to_string(), parse_date("03-15-2024").unwrap())]
    );

    // the untouched slot can still be booked, and ids were not burned
    let reservation = engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap();
    assert_eq!(reservation.appointment_id, 1);
}

#[tokio::test]
async fn test_store_unavailable_on_begin() {
    let (engine, store) = engine();
    engine.register(Role::Caregiver, "amy", "pw").await.unwrap();

    store.fail_next_begin();
    let err = engine.publish_availability_for("amy", "03-15-2024").await.unwrap_err();
    assert!(err.is_fatal());
    assert!(store.slots().await.is_empty());
}

#[tokio::test]
async fn test_role_gating() {
    let (engine, store) = engine();
    let joe = logged_in(&engine, Role::Patient, "joe").await;
    let amy = logged_in(&engine, Role::Caregiver, "amy").await;
    let nobody = Session::new();

    assert_eq!(
        engine.publish_availability(&joe, "03-15-2024").await.unwrap_err(),
        BookingError::WrongRole { required: Role::Caregiver, actual: Role::Patient }
    );
    assert_eq!(
        engine.increase_doses(&joe, "Moderna", 5).await.unwrap_err(),
        BookingError::WrongRole { required: Role::Caregiver, actual: Role::Patient }
    );
    assert_eq!(
        engine.reserve(&amy, "03-15-2024", "Moderna").await.unwrap_err(),
        BookingError::WrongRole { required: Role::Patient, actual: Role::Caregiver }
    );
    assert_eq!(
        engine.publish_availability(&nobody, "03-15-2024").await.unwrap_err(),
        BookingError::Unauthorized
    );
    assert_eq!(engine.list_appointments(&nobody).await.unwrap_err(), BookingError::Unauthorized);
    assert_eq!(
        engine.search_schedule(&nobody, "03-15-2024").await.unwrap_err(),
        BookingError::Unauthorized
    );

    assert!(store.slots().await.is_empty());
    assert_eq!(
        engine.dose_count("Moderna").await.unwrap_err(),
        BookingError::NotFound("vaccine Moderna".to_string())
    );
}

#[tokio::test]
async fn test_publish_same_date_twice_conflicts() {
    let (engine, store) = engine();
    let amy = logged_in(&engine, Role::Caregiver, "amy").await;

    engine.publish_availability(&amy, "03-15-2024").await.unwrap();
    assert!(matches!(
        engine.publish_availability(&amy, "03-15-2024").await.unwrap_err(),
        BookingError::Conflict(_)
    ));
    engine.publish_availability(&amy, "03-16-2024").await.unwrap();

    assert_eq!(store.slots().await.len(), 2);
}

#[tokio::test]
async fn test_malformed_input_is_rejected_without_mutation() {
    let (engine, store) = engine();
    let amy = logged_in(&engine, Role::Caregiver, "amy").await;
    let joe = logged_in(&engine, Role::Patient, "joe").await;

    assert!(matches!(
        engine.publish_availability(&amy, "2024-03-15").await.unwrap_err(),
        BookingError::InvalidDate(_)
    ));
    assert!(matches!(
        engine.reserve(&joe, "02-30-2024", "Moderna").await.unwrap_err(),
        BookingError::InvalidDate(_)
    ));
    assert!(matches!(
        engine.reserve(&joe, "03-15-2024", "").await.unwrap_err(),
        BookingError::InvalidArgument(_)
    ));
    assert!(matches!(
        engine.increase_doses(&amy, "Moderna", -3).await.unwrap_err(),
        BookingError::InvalidArgument(_)
    ));

    assert!(store.slots().await.is_empty());
    assert!(engine.dose_count("Moderna").await.is_err());
}

#[tokio::test]
async fn test_doses_accumulate() {
    let (engine, _store) = engine();

    let amounts = [5, 0, 12, 3];
    let mut last = 0;
    for amount in amounts {
        let now = engine.increase_doses_by("Janssen", amount).await.unwrap();
        assert!(now >= last);
        last = now;
    }

    assert_eq!(engine.dose_count("Janssen").await.unwrap(), amounts.iter().sum::<i32>());
}

#[tokio::test]
async fn test_login_and_logout() {
    let (engine, _store) = engine();
    engine.register(Role::Patient, "joe", "Secret#1").await.unwrap();
    assert_eq!(
        engine.register(Role::Patient, "joe", "other").await.unwrap_err(),
        BookingError::UsernameTaken("joe".to_string())
    );

    let mut session = Session::new();
    assert_eq!(
        engine.login(&mut session, Role::Patient, "joe", "wrong").await.unwrap_err(),
        BookingError::LoginFailed
    );
    assert_eq!(
        engine.login(&mut session, Role::Caregiver, "joe", "Secret#1").await.unwrap_err(),
        BookingError::LoginFailed
    );

    engine.login(&mut session, Role::Patient, "joe", "Secret#1").await.unwrap();
    assert_eq!(
        engine.login(&mut session, Role::Patient, "joe", "Secret#1").await.unwrap_err(),
        BookingError::AlreadyLoggedIn("joe".to_string())
    );

    assert_eq!(engine.logout(&mut session).unwrap(), "joe");
    assert_eq!(engine.logout(&mut session).unwrap_err(), BookingError::NotLoggedIn);
}

#[tokio::test]
async fn test_search_schedule() {
    let (engine, _store) = engine();
    let joe = logged_in(&engine, Role::Patient, "joe").await;
    for name in ["zoe", "amy"] {
        engine.register(Role::Caregiver, name, "pw").await.unwrap();
        engine.publish_availability_for(name, "03-15-2024").await.unwrap();
    }
    engine.increase_doses_by("Pfizer", 2).await.unwrap();
    engine.increase_doses_by("Moderna", 4).await.unwrap();

    let schedule = engine.search_schedule(&joe, "03-15-2024").await.unwrap();
    assert_eq!(schedule.caregivers, vec!["amy", "zoe"]);
    let names: Vec<&str> = schedule.vaccines.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["Moderna", "Pfizer"]);

    assert_eq!(
        engine.search_schedule(&joe, "03-16-2024").await.unwrap_err(),
        BookingError::NoCaregiverAvailable("03-16-2024".to_string())
    );
}

#[tokio::test]
async fn test_booked_date_cannot_be_republished() {
    let (engine, store) = engine();
    let amy = logged_in(&engine, Role::Caregiver, "amy").await;
    engine.register(Role::Caregiver, "bob", "pw").await.unwrap();
    engine.register(Role::Patient, "joe", "pw").await.unwrap();
    engine.register(Role::Patient, "sam", "pw").await.unwrap();
    engine.increase_doses_by("Moderna", 5).await.unwrap();

    engine.publish_availability(&amy, "03-15-2024").await.unwrap();
    engine.reserve_for("joe", "03-15-2024", "Moderna").await.unwrap();

    assert!(matches!(
        engine.publish_availability(&amy, "03-15-2024").await.unwrap_err(),
        BookingError::Conflict(_)
    ));
    assert!(store.slots().await.is_empty());

    // a later caregiver on the same date is still bookable
    engine.publish_availability_for("bob", "03-15-2024").await.unwrap();
    let reservation = engine.reserve_for("sam", "03-15-2024", "Moderna").await.unwrap();
    assert_eq!(reservation.caregiver, "bob");
    assert!(store.slots().await.is_empty());
}
