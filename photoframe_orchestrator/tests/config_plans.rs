mod common;

use common::setup_store;
use diesel::dsl::count_star;
use diesel::prelude::*;

use photoframe_orchestrator::schema::device_config_plans;
use photoframe_orchestrator::store::plans;

#[test]
fn versions_increase_and_exact_device_wins() {
    let (_dir, store) = setup_store();

    let (v1, v2) = store
        .write(|conn| {
            let v1 = plans::insert_plan(conn, "*", r#"{"interval_minutes":60}"#, "all", 100)?;
            let v2 = plans::insert_plan(conn, "frame-01", r#"{"interval_minutes":5}"#, "one", 200)?;
            Ok((v1, v2))
        })
        .unwrap();
    assert!(v2 > v1);

    let for_one = store
        .read(|conn| Ok(plans::resolve_for(conn, "frame-01")?))
        .unwrap()
        .expect("plan");
    assert_eq!(for_one.id, v2);

    // A device with no dedicated plan falls back to the wildcard.
    let for_other = store
        .read(|conn| Ok(plans::resolve_for(conn, "frame-99")?))
        .unwrap()
        .expect("plan");
    assert_eq!(for_other.id, v1);

    // No plans at all resolves to nothing.
    let (_dir2, empty) = setup_store();
    assert!(
        empty
            .read(|conn| Ok(plans::resolve_for(conn, "frame-01")?))
            .unwrap()
            .is_none()
    );
}

#[test]
fn exact_device_wins_at_equal_recency() {
    let (_dir, store) = setup_store();
    store
        .write(|conn| {
            plans::insert_plan(conn, "frame-01", r#"{"dither_mode":1}"#, "", 500)?;
            plans::insert_plan(conn, "*", r#"{"dither_mode":0}"#, "", 500)?;
            Ok(())
        })
        .unwrap();

    let plan = store
        .read(|conn| Ok(plans::resolve_for(conn, "frame-01")?))
        .unwrap()
        .expect("plan");
    assert_eq!(plan.device_id, "frame-01");
}

#[test]
fn per_device_retention_keeps_newest_200() {
    let (_dir, store) = setup_store();

    let last = store
        .write(|conn| {
            let mut last = 0;
            for i in 0..(plans::PLANS_KEEP_PER_DEVICE + 30) {
                last = plans::insert_plan(conn, "frame-01", "{}", "", i)?;
            }
            // Another device's plans are untouched by the trim.
            plans::insert_plan(conn, "frame-02", "{}", "", 0)?;
            Ok(last)
        })
        .unwrap();

    let per_device: i64 = store
        .read(|conn| {
            Ok(device_config_plans::table
                .filter(device_config_plans::device_id.eq("frame-01"))
                .select(count_star())
                .first(conn)?)
        })
        .unwrap();
    assert_eq!(per_device, plans::PLANS_KEEP_PER_DEVICE);

    let newest = store
        .read(|conn| Ok(plans::resolve_for(conn, "frame-01")?))
        .unwrap()
        .expect("plan");
    assert_eq!(newest.id, last);
}

#[test]
fn status_tracks_query_and_apply_independently() {
    let (_dir, store) = setup_store();

    store
        .write(|conn| {
            plans::record_query(conn, "frame-01", 1000, 0, 7)?;
            plans::record_applied(conn, "frame-01", 1100, 7, true, "")?;
            Ok(())
        })
        .unwrap();

    let st = store
        .read(|conn| Ok(plans::status_for(conn, "frame-01")?))
        .unwrap()
        .expect("status");
    assert_eq!(st.last_query_epoch, 1000);
    assert_eq!(st.target_version, 7);
    assert_eq!(st.applied_version, 7);
    assert!(st.apply_ok);

    // A later query must not clobber the apply fields.
    store
        .write(|conn| {
            plans::record_query(conn, "frame-01", 2000, 7, 9)?;
            Ok(())
        })
        .unwrap();
    let st = store
        .read(|conn| Ok(plans::status_for(conn, "frame-01")?))
        .unwrap()
        .expect("status");
    assert_eq!(st.target_version, 9);
    assert_eq!(st.applied_version, 7);
    assert!(st.apply_ok);
}

#[test]
fn apply_error_is_truncated() {
    let (_dir, store) = setup_store();
    let long = "e".repeat(5000);
    store
        .write(|conn| {
            plans::record_applied(conn, "frame-01", 1, 3, false, &long)?;
            Ok(())
        })
        .unwrap();

    let st = store
        .read(|conn| Ok(plans::status_for(conn, "frame-01")?))
        .unwrap()
        .expect("status");
    assert_eq!(st.apply_error.len(), plans::APPLY_ERROR_MAX_CHARS);
    assert!(!st.apply_ok);
}
