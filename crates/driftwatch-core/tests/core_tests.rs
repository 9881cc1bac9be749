use driftwatch_core::{
    AuditConfig, ContentHash, FileRecord, RecordState, ns_to_system_time, system_time_to_ns,
};
use std::path::PathBuf;

#[test]
fn test_content_hash_hex_is_stable() {
    let hash = ContentHash::new([0x01; 32]);
    let hex = hash.to_hex();
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(ContentHash::from_hex(&hex), Some(hash));

    let other = ContentHash::new([0x02; 32]);
    assert_ne!(hash, other);
    assert_ne!(hash.to_hex(), other.to_hex());
}

#[test]
fn test_record_serde_roundtrip() {
    let record = FileRecord::new_active(
        "/mnt/backup/photos/trip.jpg",
        4096,
        1_700_000_000_000_000_000,
        ContentHash::new([0x33; 32]),
        1_700_000_100_000_000_000,
    );

    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("\"state\":\"active\""));

    let back: FileRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_record_state_lifecycle_values() {
    // States are stored as TEXT in the inventory; the string forms are
    // part of the on-disk format and must not drift.
    for (state, text) in [
        (RecordState::Active, "active"),
        (RecordState::Missing, "missing"),
        (RecordState::Corrupted, "corrupted"),
    ] {
        assert_eq!(state.to_string(), text);
        assert_eq!(text.parse::<RecordState>().unwrap(), state);
    }
}

#[test]
fn test_timestamp_conversion_preserves_ordering() {
    let earlier = system_time_to_ns(ns_to_system_time(1_000));
    let later = system_time_to_ns(ns_to_system_time(2_000));
    assert!(earlier < later);
}

#[test]
fn test_config_defaults() {
    let config = AuditConfig::new("/mnt/backup");
    assert_eq!(config.root, PathBuf::from("/mnt/backup"));
    assert!(config.ext_filter.is_empty());
    assert!(!config.force_verify);
    assert_eq!(config.verify_every, 0);
}

#[test]
fn test_config_builder_with_filters() {
    let config = AuditConfig::builder()
        .root("/mnt/backup")
        .ext_filter(vec![".jpg".to_string()])
        .exclude_patterns(vec!["**/Archive/**".to_string()])
        .verify_every(100u64)
        .build()
        .unwrap();

    assert!(config.matches_extension("a.jpg"));
    assert!(!config.matches_extension("a.raw"));
    let matcher = config.exclusion_matcher().unwrap();
    assert!(matcher.is_match("/mnt/backup/Archive/old.jpg"));
}
