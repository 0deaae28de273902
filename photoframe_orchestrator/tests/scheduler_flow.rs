mod common;

use common::{insert_override, setup_store};
use diesel::dsl::count_star;
use diesel::prelude::*;

use photoframe_orchestrator::scheduler::{self, ImageSource};
use photoframe_orchestrator::schema::publish_history;
use photoframe_orchestrator::store::{devices, history};

const NOW: i64 = 1_700_000_000;

#[test]
fn daily_path_when_nothing_scheduled() {
    let (_dir, store) = setup_store();

    let d = scheduler::next_for_device(
        &store,
        "frame-01",
        NOW,
        3600,
        0,
        "http://daily.test/image/480x800?date=2023-11-14".into(),
        "http://frames.test",
    )
    .expect("decision");

    assert_eq!(d.source, ImageSource::Daily);
    assert!(d.image_url.contains("date=2023-11-14"));
    assert_eq!(d.poll_after_seconds, 3600);
    assert_eq!(d.valid_until_epoch, NOW + 3600);
    assert_eq!(d.active_override_id, None);

    // The poll upserted the device and left one history row.
    let rows = store
        .read(|conn| Ok(history::list_recent(conn, 10)?))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].device_id, "frame-01");
    assert_eq!(rows[0].source, "daily");
    assert_eq!(rows[0].poll_after_seconds, 3600);

    let wakeup = store
        .read(|conn| Ok(devices::next_wakeup(conn, "frame-01")?))
        .unwrap();
    assert_eq!(wakeup, Some(0));
}

#[test]
fn device_specific_override_beats_wildcard() {
    let (_dir, store) = setup_store();
    insert_override(&store, "*", 1000, 2000, 1, "aaaa.bmp");
    let specific = insert_override(&store, "frame-01", 1500, 1800, 2, "bbbb.bmp");

    let d = scheduler::next_for_device(
        &store,
        "frame-01",
        1600,
        3600,
        0,
        "daily".into(),
        "http://frames.test",
    )
    .unwrap();

    assert_eq!(d.source, ImageSource::Override);
    assert_eq!(d.active_override_id, Some(specific));
    assert_eq!(d.image_url, "http://frames.test/api/v1/assets/bbbb.bmp");
    assert_eq!(d.valid_until_epoch, 1800);
    assert_eq!(d.poll_after_seconds, 200);

    // Another device only sees the wildcard window.
    let d = scheduler::next_for_device(
        &store,
        "frame-02",
        1600,
        3600,
        0,
        "daily".into(),
        "http://frames.test",
    )
    .unwrap();
    assert_eq!(d.image_url, "http://frames.test/api/v1/assets/aaaa.bmp");
    assert_eq!(d.valid_until_epoch, 2000);
}

#[test]
fn newest_override_wins_among_equals() {
    let (_dir, store) = setup_store();
    insert_override(&store, "frame-01", 1000, 2000, 1, "old.bmp");
    let newer = insert_override(&store, "frame-01", 1000, 2000, 5, "new.bmp");

    let d = scheduler::next_for_device(
        &store,
        "frame-01",
        1500,
        3600,
        0,
        "daily".into(),
        "http://b",
    )
    .unwrap();
    assert_eq!(d.active_override_id, Some(newer));
}

#[test]
fn upcoming_window_shrinks_poll_interval() {
    let (_dir, store) = setup_store();
    insert_override(&store, "frame-01", NOW + 300, NOW + 900, 1, "soon.bmp");

    let d = scheduler::next_for_device(
        &store,
        "frame-01",
        NOW,
        3600,
        0,
        "daily".into(),
        "http://b",
    )
    .unwrap();

    assert_eq!(d.source, ImageSource::Daily);
    assert_eq!(d.poll_after_seconds, 300);
    // The device wakes no later than the window opens.
    assert!(NOW + d.poll_after_seconds <= NOW + 300);
}

#[test]
fn disabled_override_is_invisible() {
    let (_dir, store) = setup_store();
    let id = insert_override(&store, "frame-01", 1000, 2000, 1, "gone.bmp");
    store
        .write(|conn| {
            assert!(photoframe_orchestrator::store::overrides::disable(conn, id)?);
            Ok(())
        })
        .unwrap();

    let d = scheduler::next_for_device(&store, "frame-01", 1500, 3600, 0, "daily".into(), "b")
        .unwrap();
    assert_eq!(d.source, ImageSource::Daily);
}

#[test]
fn history_is_trimmed_to_cap_in_the_inserting_transaction() {
    let (_dir, store) = setup_store();

    store
        .write(|conn| {
            for i in 0..(history::HISTORY_KEEP + 150) {
                history::append_and_trim(
                    conn,
                    &history::NewPublish {
                        device_id: "frame-01",
                        issued_epoch: i,
                        source: "daily",
                        image_url: "u",
                        override_id: None,
                        poll_after_seconds: 3600,
                        valid_until_epoch: i + 3600,
                    },
                )?;
            }
            Ok(())
        })
        .unwrap();

    let total: i64 = store
        .read(|conn| Ok(publish_history::table.select(count_star()).first(conn)?))
        .unwrap();
    assert_eq!(total, history::HISTORY_KEEP);

    // Newest rows survived.
    let newest = store
        .read(|conn| Ok(history::list_recent(conn, 1)?))
        .unwrap();
    assert_eq!(newest[0].issued_epoch, history::HISTORY_KEEP + 149);
}
