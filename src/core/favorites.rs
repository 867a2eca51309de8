//! Session-local list of favorite currencies.

use crate::core::currency::CurrencyCode;
use std::collections::HashSet;
use tracing::debug;

/// Ordered set of currency codes. Insertion order is kept for display while
/// membership checks go through a parallel set.
#[derive(Debug, Clone, Default)]
pub struct Favorites {
    order: Vec<CurrencyCode>,
    members: HashSet<CurrencyCode>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `code` if absent, removes it otherwise. Returns whether `code`
    /// is a favorite afterwards.
    pub fn toggle(&mut self, code: &CurrencyCode) -> bool {
        if self.members.remove(code) {
            self.order.retain(|c| c != code);
            debug!(%code, "Removed favorite");
            false
        } else {
            self.members.insert(code.clone());
            self.order.push(code.clone());
            debug!(%code, "Added favorite");
            true
        }
    }

    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.members.contains(code)
    }

    pub fn list(&self) -> &[CurrencyCode] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
