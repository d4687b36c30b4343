// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Operations the worker exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Health,
    Ingest,
    Retrieve,
    Cognify,
    Visualize,
    Shutdown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Health => "health",
            Method::Ingest => "ingest",
            Method::Retrieve => "retrieve",
            Method::Cognify => "cognify",
            Method::Visualize => "visualize",
            Method::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
