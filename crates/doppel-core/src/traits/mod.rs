// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits. All extend [`PluginAdapter`] and use `#[async_trait]` for
//! dynamic dispatch.

pub mod adapter;
pub mod generator;
pub mod platform;
pub mod storage;

pub use adapter::PluginAdapter;
pub use generator::TextGenerator;
pub use platform::PlatformAdapter;
pub use storage::StorageAdapter;
