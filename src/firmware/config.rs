use log::warn;

use crate::tracker::config::{ConfigError, TrackerConfig};

fn compiled_apn() -> Option<(&'static str, &'static str, &'static str)> {
    let apn = option_env!("TRACKER_APN")?;
    let user = option_env!("TRACKER_APN_USER").unwrap_or("");
    let password = option_env!("TRACKER_APN_PASSWORD").unwrap_or("");
    Some((apn, user, password))
}

fn compiled_broker_port(default: u16) -> u16 {
    match option_env!("TRACKER_BROKER_PORT") {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("config: invalid TRACKER_BROKER_PORT={}, using {}", raw, default);
            default
        }),
        None => default,
    }
}

/// Overlays build-time cellular credentials, broker endpoint and topic, if any.
pub fn with_compiled_settings(mut config: TrackerConfig) -> Result<TrackerConfig, ConfigError> {
    if let Some((apn, user, password)) = compiled_apn() {
        config = config.with_apn(apn, user, password)?;
    }
    if let Some(host) = option_env!("TRACKER_BROKER_HOST") {
        let port = compiled_broker_port(config.broker.port);
        config = config.with_broker(host, port)?;
    }
    if let Some(topic) = option_env!("TRACKER_TOPIC") {
        config = config.with_topic(topic)?;
    }
    config.validate()?;
    Ok(config)
}
