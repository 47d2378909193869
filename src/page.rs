//! Windowing shared by request and basket-name listings.

/// Takes up to `max` items after skipping `skip`. Returns the window and
/// whether any item exists beyond it.
///
/// Only `skip + max + 1` items are pulled from the iterator, so search
/// results never need a full pre-count.
pub fn window<T>(items: impl Iterator<Item = T>, max: usize, skip: usize) -> (Vec<T>, bool) {
    let mut window: Vec<T> = items.skip(skip).take(max.saturating_add(1)).collect();
    let has_more = window.len() > max;
    window.truncate(max);
    (window, has_more)
}
