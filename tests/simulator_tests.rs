mod common;

use bustrack::config::SimulatorConfig;
use bustrack::db::Storage;
use bustrack::db::fleet::BusInput;
use bustrack::db::locations::NewLocation;
use bustrack::service::simulator;
use common::temp_db_path;
use std::fs;

async fn storage_with_bus(tag: &str) -> (Storage, i64, std::path::PathBuf) {
    let path = temp_db_path(tag);
    let storage = Storage::connect(&format!("sqlite:{}", path.display()))
        .await
        .expect("failed to open test database");
    let bus = storage
        .create_bus(BusInput {
            bus_number: Some("SIM-1".to_string()),
            license_plate: Some("DHK-SIM-1".to_string()),
            ..Default::default()
        })
        .await
        .expect("failed to create bus");
    (storage, bus.id, path)
}

fn cleanup(path: &std::path::Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn tick_records_a_simulated_position_per_bus() {
    let (storage, bus_id, path) = storage_with_bus("sim-tick").await;
    let sim = simulator::spawn_manual(storage.clone(), SimulatorConfig::default())
        .await
        .unwrap();

    sim.tick();
    sim.tick();
    let status = sim.status().await.unwrap();
    assert_eq!(status.ticks, 2);
    assert_eq!(status.simulated_buses, 1);
    assert!(!status.paused);

    let recent = storage.recent_locations(bus_id, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|l| l.is_simulated && l.driver_id.is_none()));
    let live = storage.active_bus_locations(300).await.unwrap();
    assert_eq!(live.len(), 1);

    let sim_status = storage.simulation_status(300).await.unwrap();
    assert_eq!(sim_status.simulated_buses, 1);
    assert!(sim_status.simulation_mode);

    sim.stop().await.unwrap();
    assert!(storage.active_bus_locations(300).await.unwrap().is_empty());
    cleanup(&path);
}

#[tokio::test]
async fn real_driver_pauses_the_simulator() {
    let (storage, bus_id, path) = storage_with_bus("sim-pause").await;
    let sim = simulator::spawn_manual(storage.clone(), SimulatorConfig::default())
        .await
        .unwrap();
    sim.tick();
    sim.status().await.unwrap();

    storage
        .insert_location(NewLocation {
            bus_id,
            driver_id: None,
            latitude: 23.8859,
            longitude: 90.3971,
            speed_kmh: Some(25.0),
            heading: None,
            is_simulated: false,
        })
        .await
        .unwrap();

    sim.tick();
    let status = sim.status().await.unwrap();
    assert!(status.paused);

    let live = storage.active_bus_locations(300).await.unwrap();
    assert_eq!(live.len(), 1);
    assert!(!live[0].is_simulated);
    assert!(storage.has_recent_real_location(300).await.unwrap());

    sim.stop().await.unwrap();
    cleanup(&path);
}

#[tokio::test]
async fn bus_filter_limits_simulated_buses() {
    let (storage, _bus_id, path) = storage_with_bus("sim-filter").await;
    let config = SimulatorConfig {
        bus_ids: vec![9999],
        ..Default::default()
    };
    let sim = simulator::spawn_manual(storage.clone(), config).await.unwrap();
    sim.tick();
    let status = sim.status().await.unwrap();
    assert_eq!(status.simulated_buses, 0);
    assert!(storage.active_bus_locations(300).await.unwrap().is_empty());
    sim.stop().await.unwrap();
    cleanup(&path);
}
