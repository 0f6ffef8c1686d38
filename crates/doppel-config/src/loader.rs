// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based loading.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/doppel/doppel.toml`, `~/.config/doppel/doppel.toml`, `./doppel.toml`,
//! then `DOPPEL_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DoppelConfig;

/// Sections that env keys are mapped into. `DOPPEL_QUEUE_CAPACITY` becomes `queue.capacity`.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "queue",
    "connection",
    "backoff",
    "generator",
    "orchestrator",
    "style",
    "storage",
    "gateway",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/doppel/doppel.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "doppel.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("doppel").join("doppel.toml"))
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<DoppelConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DoppelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DoppelConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file, with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<DoppelConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DoppelConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DoppelConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps `DOPPEL_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `DOPPEL_GENERATOR_API_KEY` maps to `generator.api_key`.
fn env_provider() -> Env {
    Env::prefixed("DOPPEL_").map(|key| {
        let key_str = key.as_str();
        for section in ENV_SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}
