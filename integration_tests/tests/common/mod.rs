use std::sync::Once;

use integration_tests::fixture_path;

static INIT: Once = Once::new();

/// Route crate logs into the test harness output and point the env-loaded
/// config at the test fixture.
pub fn ensure_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let config_path = fixture_path("reconcile_config.json");
        debug_assert!(
            config_path.exists(),
            "missing test reconcile config at {}",
            config_path.display()
        );
        std::env::set_var("RECONCILE_CONFIG_PATH", &config_path);
    });
}
