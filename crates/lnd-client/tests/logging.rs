//! Subscriber installation runs in its own test binary so it cannot collide
//! with the capture subscriber used by `#[traced_test]` elsewhere.

use lnd_client::logging::{self, OutputFormat, TracingConfig};
use tracing::Level;

#[test]
fn test_init_is_idempotent() {
    let config = TracingConfig::new(Level::WARN).with_format(OutputFormat::Compact);
    assert!(logging::init(config.clone()).is_ok());
    assert!(logging::init(config).is_ok());
    tracing::warn!("logging initialised twice without error");
}
