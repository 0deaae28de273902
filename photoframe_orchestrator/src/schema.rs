// Diesel table definitions for the orchestrator store.

diesel::table! {
    devices (device_id) {
        device_id -> Text,
        last_checkin_epoch -> BigInt,
        next_wakeup_epoch -> BigInt,
        sleep_seconds -> BigInt,
        poll_interval_seconds -> BigInt,
        failure_count -> BigInt,
        last_http_status -> Integer,
        fetch_ok -> Bool,
        image_changed -> Bool,
        image_source -> Text,
        last_error -> Text,
        battery_mv -> Integer,
        battery_percent -> Integer,
        charging -> Integer,
        vbus_good -> Integer,
        reported_config_json -> Text,
        reported_config_epoch -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    overrides (id) {
        id -> BigInt,
        device_id -> Text,
        start_epoch -> BigInt,
        end_epoch -> BigInt,
        asset_name -> Text,
        asset_sha256 -> Text,
        note -> Text,
        created_epoch -> BigInt,
        enabled -> Bool,
    }
}

diesel::table! {
    publish_history (id) {
        id -> BigInt,
        device_id -> Text,
        issued_epoch -> BigInt,
        source -> Text,
        image_url -> Text,
        override_id -> Nullable<BigInt>,
        poll_after_seconds -> BigInt,
        valid_until_epoch -> BigInt,
    }
}

diesel::table! {
    device_config_plans (id) {
        id -> BigInt,
        device_id -> Text,
        config_json -> Text,
        note -> Text,
        created_epoch -> BigInt,
    }
}

diesel::table! {
    device_config_status (device_id) {
        device_id -> Text,
        last_query_epoch -> BigInt,
        last_seen_version -> BigInt,
        target_version -> BigInt,
        last_apply_epoch -> BigInt,
        applied_version -> BigInt,
        apply_ok -> Bool,
        apply_error -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    devices,
    overrides,
    publish_history,
    device_config_plans,
    device_config_status,
);
