// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Publishing
//!
//! A page is either private or public. A public page has a rendered HTML
//! artifact with public-read permission, and every file attached to it is
//! public-read as well. A private page has no artifact and only private
//! files. [`Publisher`] performs the transitions; [`PublishQueue`] runs them
//! off the request path.

pub mod controller;
pub mod worker;

pub use controller::{PublishError, PublishOutcome, Publisher};
pub use worker::{spawn_workers, PublishJob, PublishQueue, PublishWorkers, QueueError};
