//! Document store behavior on a real filesystem

use serde_json::json;
use tempfile::TempDir;

use sports_data_harvester::store::{EntityStore, MatchLocation, StoreKey};
use sports_data_harvester::DetailCategory;

#[test]
fn test_write_read_and_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let store = EntityStore::new(temp_dir.path());
    let key = StoreKey::Seasons { league_id: 17 };

    assert!(!store.exists(&key));
    assert_eq!(store.read(&key).unwrap(), None);

    store.write(&key, &json!({"seasons": []})).unwrap();
    store.write(&key, &json!({"seasons": [{"id": 1}]})).unwrap();

    assert!(store.exists(&key));
    assert_eq!(store.read(&key).unwrap(), Some(json!({"seasons": [{"id": 1}]})));
    assert!(temp_dir.path().join("seasons/17.json").is_file());
}

#[test]
fn test_list_keys_ignores_temp_and_foreign_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = EntityStore::new(temp_dir.path());
    let location = MatchLocation::new(17, 61627, 9);
    store.write(&location.key(DetailCategory::Lineups), &json!({})).unwrap();
    store.write(&location.key(DetailCategory::Basic), &json!({})).unwrap();

    let dir = temp_dir.path().join("match_details/17/61627/9");
    std::fs::write(dir.join(".tmpXYZ"), b"partial").unwrap();
    std::fs::write(dir.join("notes.txt"), b"x").unwrap();

    assert_eq!(
        store.list_keys("match_details").unwrap(),
        vec![
            "match_details/17/61627/9/basic",
            "match_details/17/61627/9/lineups",
        ]
    );
    assert_eq!(store.locate_match(9).unwrap(), Some(location));
    assert_eq!(store.read_match(&location).unwrap().len(), 2);
}

#[test]
fn test_corrupt_document_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = EntityStore::new(temp_dir.path());
    let key = StoreKey::Seasons { league_id: 8 };
    std::fs::create_dir_all(temp_dir.path().join("seasons")).unwrap();
    std::fs::write(temp_dir.path().join("seasons/8.json"), b"{trunc").unwrap();

    assert!(store.read(&key).is_err());
}
