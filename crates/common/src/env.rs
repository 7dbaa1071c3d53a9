// Catapult - Declarative EVM Deployment Orchestrator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Environment variable name constants for Catapult configuration.
//!
//! These constants ensure consistency across the codebase and provide a single
//! source of truth for environment variable names.

/// Environment variable holding the deployer private key.
///
/// The value must be a 32-byte hex string, with or without a `0x` prefix. The
/// same key is used on every target network; each execution context derives
/// its signer from it independently.
///
/// The `--private-key` CLI argument takes precedence over this variable.
///
/// # Examples
///
/// ```bash
/// CATAPULT_PRIVATE_KEY=0xac0974... catapult run --network sepolia
/// ```
pub const CATAPULT_PRIVATE_KEY: &str = "CATAPULT_PRIVATE_KEY";

/// Environment variable for overriding the log file directory.
///
/// When not set, log files are written under the system temporary directory
/// (see [`crate::logging`]). Setting this variable redirects the rolling log
/// files without affecting console output.
pub const CATAPULT_LOG_DIR: &str = "CATAPULT_LOG_DIR";
