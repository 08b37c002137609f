//! Persistence tests for the sled agency store
#![cfg(feature = "sled-backend")]

use clustertopo::common::{StoreBackend, StoreConfig};
use clustertopo::store::SledStore;
use clustertopo::{Agency, AgencyStore, Config, Namespace};
use tempfile::TempDir;

fn sled_config(dir: &TempDir) -> Config {
    Config {
        store: StoreConfig {
            backend: StoreBackend::Sled,
            path: Some(dir.path().join("agency")),
        },
        ..Config::default()
    }
}

#[test]
fn test_roster_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = sled_config(&dir);

    // Write the target roster
    {
        let agency = Agency::from_config(&config).unwrap();
        agency.add_pair("pavel", "sandro").unwrap();
        agency.add_coordinator("carlos").unwrap();
    }

    // Reopen and verify
    {
        let agency = Agency::from_config(&config).unwrap();
        let roster = agency.db_servers(Namespace::Target).get_list().unwrap();
        assert_eq!(roster["pavel"].secondary(), Some("sandro"));
        assert_eq!(roster.len(), 2);

        let report = agency.diff_plan().report().unwrap();
        assert_eq!(report.db_servers.missing.len(), 2);
        assert_eq!(report.coordinators.missing[0].id, "carlos");
    }
}

#[test]
fn test_remove_server_is_atomic_on_sled() {
    let dir = TempDir::new().unwrap();
    let store = SledStore::open(dir.path().join("agency")).unwrap();
    assert!(store.supports_transactions());

    store.set("Target/DBServers/pavel", "sandro".into()).unwrap();
    store.set("Target/DBServers/paul", "none".into()).unwrap();
    store.flush().unwrap();

    let agency = Agency::new(
        std::sync::Arc::new(store),
        std::sync::Arc::new(clustertopo::store::StaticRegistry::new()),
    );
    assert!(agency.remove_server("pavel").unwrap());
    let roster = agency.db_servers(Namespace::Target).get_list().unwrap();
    let ids: Vec<_> = roster.keys().cloned().collect();
    assert_eq!(ids, vec!["paul", "sandro"]);
}
