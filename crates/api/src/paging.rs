//! Query paging shared by the message list handlers.

use maildrop_message::CapturedMessage;
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 250;

/// `start`/`limit` query parameters. A missing or zero limit falls back to
/// the default; limits above the cap are clamped.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    start: usize,
    limit: Option<usize>,
}

impl Paging {
    pub(crate) fn start(&self) -> usize {
        self.start
    }

    pub(crate) fn limit(&self) -> usize {
        match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        }
    }
}

/// One page of listed messages.
#[derive(Debug, Serialize)]
pub(crate) struct MessagePage {
    pub total: usize,
    pub count: usize,
    pub start: usize,
    pub items: Vec<CapturedMessage>,
}

impl MessagePage {
    pub(crate) fn new(total: usize, start: usize, items: Vec<CapturedMessage>) -> Self {
        Self {
            total,
            count: items.len(),
            start,
            items,
        }
    }
}
