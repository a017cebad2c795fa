use chronopath_system_simulation::{SimulationConfig, SimulationController};

#[test]
fn bundled_configuration_matches_defaults() {
    let contents = include_str!("../../../chronopath.toml");

    let config = SimulationConfig::from_toml_str(contents).expect("bundled configuration parses");

    assert_eq!(config, SimulationConfig::default());
    assert!(SimulationController::new(config).is_ok());
}
