// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! Every rule runs; all violations are returned together.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::DoppelConfig;

/// Validates a deserialized configuration.
pub fn validate_config(config: &DoppelConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_queue(config, &mut errors);
    check_connection(config, &mut errors);
    check_generator(config, &mut errors);

    if config.orchestrator.generation_failure_budget < 1 {
        errors.push(ConfigError::validation(
            "orchestrator.generation_failure_budget must be at least 1",
        ));
    }

    if config.style.max_sample_chars == 0 {
        errors.push(ConfigError::validation(
            "style.max_sample_chars must be greater than 0",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.gateway.enabled && config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    }

    check_channels(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_queue(config: &DoppelConfig, errors: &mut Vec<ConfigError>) {
    if config.queue.capacity == 0 {
        errors.push(ConfigError::validation(
            "queue.capacity must be greater than 0",
        ));
    }
    if config.queue.max_delivery_attempts < 1 {
        errors.push(ConfigError::validation(
            "queue.max_delivery_attempts must be at least 1",
        ));
    }
}

fn check_connection(config: &DoppelConfig, errors: &mut Vec<ConfigError>) {
    let conn = &config.connection;

    if conn.failure_threshold < 1 {
        errors.push(ConfigError::validation(
            "connection.failure_threshold must be at least 1",
        ));
    }

    if conn.degraded_max_attempts < 1
        || conn.degraded_max_attempts > config.queue.max_delivery_attempts
    {
        errors.push(ConfigError::validation(format!(
            "connection.degraded_max_attempts must be between 1 and queue.max_delivery_attempts ({}), got {}",
            config.queue.max_delivery_attempts, conn.degraded_max_attempts
        )));
    }

    for (key, value) in [
        ("connection.probe_interval_secs", conn.probe_interval_secs),
        ("connection.probe_timeout_secs", conn.probe_timeout_secs),
        ("connection.send_timeout_secs", conn.send_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be at least 1"
            )));
        }
    }

    let backoff = &config.backoff;
    if backoff.base_ms == 0 {
        errors.push(ConfigError::validation("backoff.base_ms must be greater than 0"));
    }
    if backoff.factor < 1 {
        errors.push(ConfigError::validation("backoff.factor must be at least 1"));
    }
    if backoff.cap().as_millis() < u128::from(backoff.base_ms) {
        errors.push(ConfigError::validation(format!(
            "backoff.cap_secs ({}s) must not be below backoff.base_ms ({}ms)",
            backoff.cap_secs, backoff.base_ms
        )));
    }
}

fn check_generator(config: &DoppelConfig, errors: &mut Vec<ConfigError>) {
    let generator = &config.generator;

    if !is_http_url(&generator.endpoint) {
        errors.push(ConfigError::validation(format!(
            "generator.endpoint `{}` must be an http(s) URL",
            generator.endpoint
        )));
    }
    if generator.model.trim().is_empty() {
        errors.push(ConfigError::validation("generator.model must not be empty"));
    }
    if generator.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "generator.timeout_secs must be at least 1",
        ));
    }
    if generator.max_concurrency == Some(0) {
        errors.push(ConfigError::validation(
            "generator.max_concurrency must be at least 1 when set",
        ));
    }
}

fn check_channels(config: &DoppelConfig, errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();

    for (i, channel) in config.channels.iter().enumerate() {
        if channel.id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "channels[{i}].id must not be empty"
            )));
            continue;
        }
        if !seen.insert(channel.id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate channel id `{}` in [[channels]]",
                channel.id
            )));
        }
        for (key, url) in [
            ("health_url", &channel.health_url),
            ("send_url", &channel.send_url),
        ] {
            if let Some(url) = url
                && !is_http_url(url)
            {
                errors.push(ConfigError::validation(format!(
                    "channels[{i}].{key} `{url}` must be an http(s) URL"
                )));
            }
        }
    }
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelConfig;

    fn channel(id: &str) -> ChannelConfig {
        ChannelConfig {
            id: id.to_string(),
            kind: None,
            health_url: None,
            send_url: None,
            auth_token: None,
            enabled: true,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&DoppelConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = DoppelConfig::default();
        config.queue.capacity = 0;
        config.orchestrator.generation_failure_budget = 0;
        config.generator.max_concurrency = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn degraded_budget_cannot_exceed_total_budget() {
        let mut config = DoppelConfig::default();
        config.connection.degraded_max_attempts = 6;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("degraded_max_attempts"));
    }

    #[test]
    fn duplicate_channel_ids_rejected() {
        let mut config = DoppelConfig::default();
        config.channels = vec![channel("email:work"), channel("email:work")];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("duplicate channel id"));
    }

    #[test]
    fn non_http_urls_rejected() {
        let mut config = DoppelConfig::default();
        let mut sms = channel("sms");
        sms.send_url = Some("ftp://bridge".into());
        config.channels = vec![sms];

        assert!(validate_config(&config).is_err());
    }
}
