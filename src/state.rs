// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::wiki::Wiki;

#[derive(Clone)]
pub struct AppState {
    pub wiki: Arc<Wiki>,
}

impl AppState {
    pub fn new(wiki: Wiki) -> Self {
        Self {
            wiki: Arc::new(wiki),
        }
    }
}
