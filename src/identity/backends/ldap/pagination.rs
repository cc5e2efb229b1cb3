// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Marker-based pagination.
//!
//! The directory protocol exposes no server-side cursors, so listings are
//! paged client-side: the full candidate list is materialized, sorted by a
//! caller-chosen key and sliced around the marker. Page contents and page
//! markers are computed independently against the same sorted order, so the
//! two calls always agree. O(n log n) per call, intentionally trading
//! efficiency for backend independence.
//!
//! Pages are per-call snapshots: concurrent writers may re-order items
//! between calls, and no consistency is guaranteed across pages.

use crate::identity::types::PageMarkers;

/// Return one page of `items`: the first `limit` items when no marker is
/// given, otherwise up to `limit` items starting at the first item whose key
/// is greater than or equal to the marker.
pub fn get_page<T, K>(marker: Option<&str>, limit: usize, mut items: Vec<T>, key: K) -> Vec<T>
where
    K: Fn(&T) -> &str,
{
    items.sort_by(|a, b| key(a).cmp(key(b)));
    match marker {
        None => {
            items.truncate(limit);
            items
        }
        Some(marker) => items
            .into_iter()
            .skip_while(|item| key(item) < marker)
            .take(limit)
            .collect(),
    }
}

/// Compute the `(prev, next)` markers surrounding the page that
/// [`get_page`] would return for the same arguments.
pub fn get_page_markers<T, K>(
    marker: Option<&str>,
    limit: usize,
    mut items: Vec<T>,
    key: K,
) -> PageMarkers
where
    K: Fn(&T) -> &str,
{
    if items.len() < limit {
        return PageMarkers::default();
    }
    items.sort_by(|a, b| key(a).cmp(key(b)));
    match marker {
        None => {
            let next = if items.len() <= limit + 1 {
                None
            } else {
                Some(key(&items[limit]).to_string())
            };
            PageMarkers { prev: None, next }
        }
        Some(marker) => {
            let start = items
                .iter()
                .position(|item| key(item) >= marker)
                .unwrap_or(items.len());
            let prev = if start < limit {
                None
            } else {
                Some(key(&items[start - limit]).to_string())
            };
            let next = if start + limit >= items.len() {
                None
            } else {
                Some(key(&items[start + limit]).to_string())
            };
            PageMarkers { prev, next }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<String> {
        // Zero-padded so that the lexicographic sort order matches the
        // numeric one.
        (0..n).map(|i| format!("{i:03}")).collect()
    }

    fn page(marker: Option<&str>, limit: usize, n: usize) -> Vec<String> {
        get_page(marker, limit, items(n), |e| e.as_str())
    }

    fn markers(marker: Option<&str>, limit: usize, n: usize) -> PageMarkers {
        get_page_markers(marker, limit, items(n), |e| e.as_str())
    }

    #[test]
    fn test_first_page() {
        assert_eq!(page(None, 3, 10), ["000", "001", "002"]);
    }

    #[test]
    fn test_page_starts_at_marker() {
        assert_eq!(page(Some("004"), 3, 10), ["004", "005", "006"]);
        // A marker between keys starts at the next existing item.
        assert_eq!(page(Some("0041"), 3, 10), ["005", "006", "007"]);
    }

    #[test]
    fn test_page_shorter_than_limit_at_the_end() {
        assert_eq!(page(Some("008"), 5, 10), ["008", "009"]);
        assert!(page(Some("zzz"), 5, 10).is_empty());
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let shuffled = vec!["003".to_string(), "001".into(), "002".into(), "000".into()];
        assert_eq!(
            get_page(None, 2, shuffled, |e| e.as_str()),
            ["000", "001"]
        );
    }

    #[test]
    fn test_markers_short_list() {
        assert_eq!(markers(None, 5, 3), PageMarkers::default());
        assert_eq!(markers(Some("001"), 5, 3), PageMarkers::default());
    }

    #[test]
    fn test_markers_without_marker() {
        assert_eq!(
            markers(None, 3, 10),
            PageMarkers {
                prev: None,
                next: Some("003".into())
            }
        );
        // A list that fits within limit + 1 has no next page marker.
        assert_eq!(markers(None, 3, 4), PageMarkers::default());
    }

    #[test]
    fn test_markers_with_marker() {
        assert_eq!(
            markers(Some("005"), 2, 10),
            PageMarkers {
                prev: Some("003".into()),
                next: Some("007".into())
            }
        );
        // Too few predecessors for a full previous page.
        assert_eq!(
            markers(Some("001"), 2, 10),
            PageMarkers {
                prev: None,
                next: Some("003".into())
            }
        );
        // Too few successors for a next page.
        assert_eq!(
            markers(Some("008"), 2, 10),
            PageMarkers {
                prev: Some("006".into()),
                next: None
            }
        );
    }

    #[test]
    fn test_next_marker_chain_has_no_gaps_or_overlap() {
        let limit = 3;
        let mut seen: Vec<String> = page(None, limit, 11);
        let mut marker = markers(None, limit, 11).next;
        while let Some(m) = marker {
            let next_page = page(Some(&m), limit, 11);
            assert_eq!(next_page.first(), Some(&m));
            seen.extend(next_page);
            marker = markers(Some(&m), limit, 11).next;
        }
        // The original's no-marker quirk keeps the next marker empty once
        // the remainder fits within limit + 1 items, so the chain covers
        // everything up to that tail.
        let expected: Vec<String> = items(11);
        assert_eq!(seen, expected[..seen.len()]);
        assert!(expected.len() - seen.len() <= limit + 1);
    }
}
