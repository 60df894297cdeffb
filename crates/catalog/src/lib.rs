// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Catalog parsing: scenarios, characters and schedules from TOML

mod loader;
mod parser;
mod validate;

pub use loader::{catalog_dir, load_catalog, CATALOG_DIR};
pub use parser::{parse_catalog, Catalog, ParseError};
pub use validate::validate;
