//! Total order over opaque content ids.

use std::cmp::Ordering;

/// Compare two content ids.
///
/// Ids that both parse as integers compare numerically, so `"120" > "15"`.
/// Anything else falls back to plain string order.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            log::warn!("Non-numeric content id in {a:?} vs {b:?}, using string order");
            a.cmp(b)
        }
    }
}

/// True when `id` orders numerically under [`compare_ids`].
pub fn is_numeric_id(id: &str) -> bool {
    numeric(id).is_some()
}

fn numeric(id: &str) -> Option<i128> {
    id.trim().parse().ok()
}
