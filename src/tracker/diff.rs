use std::collections::HashSet;

use crate::models::{Listing, Snapshot};

/// Listings of `snapshot` whose url is not in `seen`, in snapshot order.
pub fn new_listings<'a>(snapshot: &'a Snapshot, seen: &HashSet<String>) -> Vec<&'a Listing> {
    snapshot
        .listings
        .iter()
        .filter(|listing| !seen.contains(&listing.url))
        .collect()
}
