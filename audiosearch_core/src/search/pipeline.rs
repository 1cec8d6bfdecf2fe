//! Date-window filtering and deterministic sorting of merged listings.
//!
//! All sorts are stable: listings with equal keys keep aggregation order
//! (source registration order, then the order the site returned them).
//! Listings missing the sort key always go last, whatever the direction.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::{DateWindow, SortDirection, SortKey, SortOrder};
use crate::listing::Listing;

/// Filter by `window` (if any), then sort by `order`.
pub fn apply(
    listings: Vec<Listing>,
    window: Option<DateWindow>,
    order: SortOrder,
    now: DateTime<Utc>,
) -> Vec<Listing> {
    let mut listings = match window {
        Some(window) => filter_by_window(listings, window, now),
        None => listings,
    };
    sort_listings(&mut listings, order);
    listings
}

/// Keep listings posted inside the window. Undated listings are always kept.
pub fn filter_by_window(
    listings: Vec<Listing>,
    window: DateWindow,
    now: DateTime<Utc>,
) -> Vec<Listing> {
    let cutoff = window.cutoff(now);
    listings
        .into_iter()
        .filter(|listing| match listing.posted_at {
            Some(posted) => posted >= cutoff,
            None => true,
        })
        .collect()
}

/// Stable in-place sort.
pub fn sort_listings(listings: &mut [Listing], order: SortOrder) {
    match order.key {
        // Aggregation order is the relevance order; direction does not apply.
        SortKey::Relevance => {}
        SortKey::Price => listings.sort_by(|a, b| {
            compare_present_first(a.price_amount(), b.price_amount(), order.direction, |x, y| {
                x.total_cmp(y)
            })
        }),
        SortKey::Date => listings.sort_by(|a, b| {
            compare_present_first(a.posted_at, b.posted_at, order.direction, |x, y| x.cmp(y))
        }),
    }
}

fn compare_present_first<T>(
    a: Option<T>,
    b: Option<T>,
    direction: SortDirection,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => cmp(&a, &b),
            SortDirection::Desc => cmp(&b, &a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
