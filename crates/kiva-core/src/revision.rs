use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::DbError;
use crate::value::Document;

/// Monotonically increasing fallback clock, used only when no hash
/// function is configured. Guarantees strictly increasing suffixes even
/// if the wall clock doesn't advance between calls.
static CLOCK: AtomicU64 = AtomicU64::new(0);

fn parse_prefix(previous: Option<&str>) -> u64 {
    previous
        .and_then(|r| r.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0)
}

fn fallback_suffix() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let prev = CLOCK.fetch_max(now, Ordering::SeqCst);
    let stamp = now.max(prev + 1);
    CLOCK.store(stamp, Ordering::SeqCst);
    stamp.to_string()
}

/// Compute the next revision string for `payload`, given the document's
/// previous revision (`None` for a new document) and `rev_field` (the name
/// of the revision field, excluded from the hashed payload).
pub fn next(
    previous: Option<&str>,
    payload: &Document,
    rev_field: &str,
    hasher: Option<&dyn Fn(&[u8]) -> String>,
) -> Result<String, DbError> {
    let n = parse_prefix(previous) + 1;
    let suffix = match hasher {
        Some(h) => {
            let mut stripped = payload.clone();
            stripped.remove(rev_field);
            let bytes = serde_json::to_vec(&stripped)
                .map_err(|e| DbError::Validation {
                    path: rev_field.to_string(),
                    message: e.to_string(),
                })?;
            let s = h(&bytes);
            if s.is_empty() {
                fallback_suffix()
            } else {
                s
            }
        }
        None => fallback_suffix(),
    };
    Ok(format!("{n}-{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_revision_starts_at_one() {
        let doc = json!({"name": "Alice"}).as_object().unwrap().clone();
        let rev = next(None, &doc, "_rev", None).unwrap();
        assert!(rev.starts_with("1-"));
    }

    #[test]
    fn revision_prefix_strictly_increases() {
        let doc = json!({"name": "Alice"}).as_object().unwrap().clone();
        let rev1 = next(None, &doc, "_rev", None).unwrap();
        let rev2 = next(Some(&rev1), &doc, "_rev", None).unwrap();
        assert!(rev2.starts_with("2-"));
    }

    #[test]
    fn hash_suffix_is_deterministic_for_same_payload() {
        let doc = json!({"name": "Alice"}).as_object().unwrap().clone();
        let hasher = |b: &[u8]| -> String { format!("{}", b.len()) };
        let rev1 = next(None, &doc, "_rev", Some(&hasher)).unwrap();
        let rev2 = next(None, &doc, "_rev", Some(&hasher)).unwrap();
        assert_eq!(rev1, rev2);
    }

    #[test]
    fn empty_hash_falls_back_to_clock() {
        let doc = json!({"name": "Alice"}).as_object().unwrap().clone();
        let hasher = |_: &[u8]| -> String { String::new() };
        let rev = next(None, &doc, "_rev", Some(&hasher)).unwrap();
        assert!(rev.starts_with("1-"));
        assert!(!rev.ends_with("1-"));
    }
}
