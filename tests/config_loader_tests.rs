use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;
use timetrack::config::{ConfigError, ConfigLoader};

const KEY_B64: &str = "YWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWE=";
const SECRET: &str = "0123456789abcdef0123456789abcdef";

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
    let keys: Vec<String> = env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("TIMETRACK_"))
        .collect();
    unsafe {
        for key in keys {
            env::remove_var(key);
        }
    }
}

fn set_required_secrets() {
    unsafe {
        env::set_var("TIMETRACK_CRYPTO_KEY", KEY_B64);
        env::set_var("TIMETRACK_JWT_SECRET", SECRET);
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();

    let temp_dir = TempDir::new().unwrap();
    let cfg = loader(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.storage.backend, "memory");
    assert_eq!(cfg.clickup_api_base, "https://api.clickup.com/api/v2");
    assert_eq!(cfg.workers.tick_ms, 500);
    assert_eq!(cfg.sync.level_cache_ttl_seconds, 300);
    assert_eq!(cfg.crypto_key.as_ref().map(Vec::len), Some(32));
    assert!(!cfg.clickup_configured());
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "TIMETRACK_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "TIMETRACK_API_BIND_ADDR=192.168.0.10:5000\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "TIMETRACK_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "TIMETRACK_PROFILE=test\nTIMETRACK_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let cfg = loader(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "TIMETRACK_API_BIND_ADDR=127.0.0.1:3000\nTIMETRACK_APP_URL=https://file.example.com\n",
    );

    unsafe {
        env::set_var("TIMETRACK_API_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("TIMETRACK_APP_URL", "https://track.example.com/");
    }

    let cfg = loader(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    // Trailing slash trimmed so redirect URIs join cleanly
    assert_eq!(cfg.app_url, "https://track.example.com");

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();
    unsafe {
        env::set_var("TIMETRACK_API_BIND_ADDR", "not-an-address");
    }

    let temp_dir = TempDir::new().unwrap();
    let err = loader(&temp_dir).load().expect_err("bind addr rejected");
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
    clear_env();
}

#[test]
fn missing_secrets_are_reported() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let err = loader(&temp_dir).load().expect_err("crypto key required");
    assert!(matches!(err, ConfigError::MissingCryptoKey));

    unsafe {
        env::set_var("TIMETRACK_CRYPTO_KEY", KEY_B64);
    }
    let err = loader(&temp_dir).load().expect_err("jwt secret required");
    assert!(matches!(err, ConfigError::MissingJwtSecret));
    clear_env();
}

#[test]
fn crypto_key_must_be_valid_base64_of_32_bytes() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("TIMETRACK_CRYPTO_KEY", "!!not base64!!");
    }
    let err = loader(&temp_dir).load().expect_err("bad base64");
    assert!(matches!(err, ConfigError::InvalidCryptoKeyBase64 { .. }));

    unsafe {
        env::set_var("TIMETRACK_CRYPTO_KEY", "c2hvcnQ=");
    }
    let err = loader(&temp_dir).load().expect_err("short key");
    assert!(matches!(
        err,
        ConfigError::InvalidCryptoKeyLength { length: 5 }
    ));
    clear_env();
}

#[test]
fn production_profile_rejects_memory_storage_and_weak_secret() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("TIMETRACK_PROFILE", "prod");
    }
    let err = loader(&temp_dir).load().expect_err("memory storage rejected");
    assert!(matches!(err, ConfigError::MemoryStorageOutsideDev));

    unsafe {
        env::set_var("TIMETRACK_STORAGE_BACKEND", "s3");
        env::set_var("TIMETRACK_R2_ACCOUNT_ID", "acct");
        env::set_var("TIMETRACK_R2_ACCESS_KEY_ID", "ak");
        env::set_var("TIMETRACK_R2_SECRET_ACCESS_KEY", "sk");
    }
    let cfg = loader(&temp_dir).load().expect("s3 config accepted");
    assert_eq!(
        cfg.storage.resolved_endpoint().as_deref(),
        Some("https://acct.r2.cloudflarestorage.com")
    );

    unsafe {
        env::set_var("TIMETRACK_JWT_SECRET", "short");
    }
    let err = loader(&temp_dir).load().expect_err("weak secret rejected");
    assert!(matches!(err, ConfigError::WeakJwtSecret { length: 5 }));
    clear_env();
}

#[test]
fn redacted_json_hides_secrets() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();
    unsafe {
        env::set_var("TIMETRACK_CLICKUP_CLIENT_ID", "client");
        env::set_var("TIMETRACK_CLICKUP_CLIENT_SECRET", "very-secret-value");
    }

    let temp_dir = TempDir::new().unwrap();
    let cfg = loader(&temp_dir).load().expect("config loads");
    assert!(cfg.clickup_configured());

    let json = cfg.redacted_json().expect("serializes");
    assert!(!json.contains("very-secret-value"));
    assert!(!json.contains(SECRET));
    assert!(json.contains("client"));
    clear_env();
}

#[test]
fn invalid_worker_settings_are_rejected() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();
    unsafe {
        env::set_var("TIMETRACK_WORKER_JITTER_FACTOR", "1.5");
    }

    let temp_dir = TempDir::new().unwrap();
    let err = loader(&temp_dir).load().expect_err("jitter out of range");
    assert!(matches!(err, ConfigError::InvalidWorkerJitter { .. }));
    clear_env();
}

#[test]
fn oversized_worker_durations_are_rejected() {
    let _guard = env_guard();
    clear_env();
    set_required_secrets();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("TIMETRACK_WORKER_MAX_RUN_SECONDS", u64::MAX.to_string());
    }
    let err = loader(&temp_dir).load().expect_err("max run too large");
    assert!(matches!(
        err,
        ConfigError::InvalidWorkerMaxRun { value } if value == u64::MAX
    ));

    unsafe {
        env::set_var("TIMETRACK_WORKER_MAX_RUN_SECONDS", "0");
    }
    let err = loader(&temp_dir).load().expect_err("max run zero");
    assert!(matches!(err, ConfigError::InvalidWorkerMaxRun { value: 0 }));

    unsafe {
        env::set_var("TIMETRACK_WORKER_MAX_RUN_SECONDS", "600");
        env::set_var("TIMETRACK_WORKER_MAX_BACKOFF_SECONDS", "99999999999");
    }
    let err = loader(&temp_dir).load().expect_err("max backoff too large");
    assert!(matches!(err, ConfigError::InvalidWorkerMaxBackoff { .. }));

    unsafe {
        env::set_var("TIMETRACK_WORKER_MAX_BACKOFF_SECONDS", "86400");
        env::set_var("TIMETRACK_WORKER_MAX_RUN_SECONDS", "86400");
    }
    let cfg = loader(&temp_dir).load().expect("bounds are inclusive");
    assert_eq!(cfg.workers.max_run_seconds, 86_400);
    clear_env();
}
