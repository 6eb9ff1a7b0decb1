//! User-sync directive filtering.

use std::collections::HashSet;

use super::types::{SyncDirective, SyncOptions};

/// Drop directives whose type the publisher disallows and remove exact
/// duplicates, keeping the first occurrence and declaration order.
///
/// Directives that differ in any byte of their URL are distinct.
#[must_use]
pub fn filter_directives(
    partner: &str,
    options: &SyncOptions,
    directives: Vec<SyncDirective>,
) -> Vec<SyncDirective> {
    let mut seen = HashSet::new();
    directives
        .into_iter()
        .filter(|directive| {
            if !options.allows(directive.sync_type) {
                log::debug!(
                    "{partner}: {} sync not allowed, skipping {}",
                    directive.sync_type,
                    directive.url
                );
                return false;
            }
            seen.insert(directive.clone())
        })
        .collect()
}
