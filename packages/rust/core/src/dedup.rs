//! URL-based duplicate gate between raw and processed datasets.
//!
//! The `url` field is the identity of a record. Records without a string
//! `url` have no identity: they are never considered duplicates and are
//! always forwarded.

use std::collections::HashSet;

use artcallfinder_shared::Record;

/// Every url present in `records`.
pub fn existing_urls(records: &[Record]) -> HashSet<String> {
    records
        .iter()
        .filter_map(Record::url)
        .map(str::to_owned)
        .collect()
}

/// Records from `incoming` whose url is absent from `existing`, in their
/// original order.
///
/// Urls repeated within `incoming` itself are forwarded once (first wins).
pub fn select_new(incoming: &[Record], existing: &[Record]) -> Vec<Record> {
    let mut seen = existing_urls(existing);
    incoming
        .iter()
        .filter(|record| match record.url() {
            Some(url) => seen.insert(url.to_owned()),
            None => true,
        })
        .cloned()
        .collect()
}

/// Append the `additions` whose url is not yet present in `existing`.
/// Records without a url are always appended. Urls stay unique in the result.
pub fn merge_by_url(mut existing: Vec<Record>, additions: Vec<Record>) -> Vec<Record> {
    let fresh = select_new(&additions, &existing);
    existing.extend(fresh);
    existing
}
