use std::fs;
use std::path::PathBuf;

use core_shaping::config::SHAPING_CONFIG_PATH_VAR;
use core_shaping::{load_shaping_config_from_env, DetectorKind, RewardMode};

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", std::process::id(), name))
}

/// Single test so the environment variable is never raced within this binary.
#[test]
fn env_override_then_fallbacks() {
    let path = scratch_path("shaping_config.json");
    fs::write(
        &path,
        r#"{ "reward_mode": "pass_through", "detector": { "kind": "weapon_aware" } }"#,
    )
    .expect("write override config");

    std::env::set_var(SHAPING_CONFIG_PATH_VAR, &path);
    let (config, metadata) = load_shaping_config_from_env();
    assert_eq!(config.reward_mode, RewardMode::PassThrough);
    assert_eq!(config.detector.kind, DetectorKind::WeaponAware);
    assert_eq!(metadata.path(), Some(&path));

    fs::write(&path, r#"{ "event_buffer": { "capacity": 0 } }"#).expect("write invalid config");
    let (config, metadata) = load_shaping_config_from_env();
    assert!(metadata.is_builtin());
    assert_eq!(config.event_buffer.capacity, 100);

    std::env::remove_var(SHAPING_CONFIG_PATH_VAR);
    let (config, metadata) = load_shaping_config_from_env();
    assert!(!metadata.is_builtin());
    assert_eq!(config.reward_mode, RewardMode::Rarity);

    let _ = fs::remove_file(&path);
}
