//! League registry files

use std::io::Write;
use tempfile::NamedTempFile;

use sports_data_harvester::registry::{LeagueRegistry, RegistryError};

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# my leagues\nEredivisie: 37\nBundesliga: 35").unwrap();

    let registry = LeagueRegistry::from_file(file.path()).unwrap();

    let ids: Vec<u64> = registry.entries().iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![37, 35]);
    assert_eq!(registry.id("bundesliga"), Some(35));
    assert_eq!(registry.name(17), None);
}

#[test]
fn test_missing_file() {
    let err = LeagueRegistry::from_file("/nonexistent/leagues.txt").unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
}
