// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Catapult Common - Shared functionality for Catapult components
//!
//! This crate provides the data model shared by the engine and the CLI:
//! artifacts, network descriptors, jobs, templates, actions, the typed
//! event stream, and logging setup.

pub mod env;
pub mod events;
pub mod logging;
pub mod test_utils;
pub mod types;

pub use events::*;
pub use types::*;
