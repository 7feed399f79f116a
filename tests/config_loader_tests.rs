use crm::config::{ConfigError, ConfigLoader};
use rust_decimal_macros::dec;
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const KEYS: &[&str] = &[
    "CRM_PROFILE",
    "CRM_API_BIND_ADDR",
    "CRM_LOG_LEVEL",
    "CRM_DATABASE_URL",
    "CRM_DB_MAX_CONNECTIONS",
    "CRM_SHIPPING_RATE_PER_MILE",
    "CRM_QUOTE_NUMBER_PREFIX",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for key in KEYS {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.db_max_connections, 10);
    assert!(cfg.run_migrations);
    assert_eq!(cfg.shipping.rate_per_mile, dec!(3.85));
    assert_eq!(cfg.quote_number_prefix, "Q");
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "CRM_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "CRM_API_BIND_ADDR=192.168.0.10:5000\nCRM_QUOTE_NUMBER_PREFIX=EST\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "CRM_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "CRM_PROFILE=test\nCRM_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.quote_number_prefix, "EST");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "CRM_API_BIND_ADDR=127.0.0.1:3000\nCRM_SHIPPING_RATE_PER_MILE=4.10\n",
    );

    unsafe {
        env::set_var("CRM_API_BIND_ADDR", "0.0.0.0:9090");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.shipping.rate_per_mile, dec!(4.10));

    clear_env();
}

#[test]
fn unprefixed_keys_are_ignored() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "API_BIND_ADDR=127.0.0.1:1234\n");

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("CRM_API_BIND_ADDR", "not-an-addr");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("invalid bind addr should fail");
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}

#[test]
fn negative_shipping_rate_is_rejected() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("CRM_SHIPPING_RATE_PER_MILE", "-1.00");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("negative rate should fail");
    assert!(matches!(
        err,
        ConfigError::NegativeShippingAmount {
            field: "SHIPPING_RATE_PER_MILE",
            ..
        }
    ));

    clear_env();
}

#[test]
fn zero_max_connections_is_rejected() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("CRM_DB_MAX_CONNECTIONS", "0");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("zero connections should fail");
    assert!(matches!(err, ConfigError::InvalidMaxConnections));

    clear_env();
}
