// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event routing
//!
//! - `EventBus` - Route published events to matching subscribers
//! - `EventPattern` - Pattern matching on event names (`run:*`, `**`)

mod bus;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use subscription::{EventPattern, SubscriberId, Subscription};
