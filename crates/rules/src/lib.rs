// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bc-rules: the allow-list (C2), robots cache (C3), rules store (C4), dedup
//! store (C5), and the rules engine (C6) that composes them into a single
//! ordered suppression decision.

pub mod allowlist;
pub mod dedup;
pub mod engine;
pub mod robots;
pub mod store;

pub use allowlist::AllowList;
pub use dedup::{DedupStore, DeduplicationCheck, FingerprintRecord};
pub use engine::{ErrorType, RulesEngine, SuppressionResult};
pub use robots::{ParsedRobots, ReqwestRobotsFetcher, RobotsCache, RobotsError, RobotsFetcher};
pub use store::{Defaults, MaintenanceWindow, Rule, RulesError, RulesStore};
