//! Name matching between logical object names and listed object types

use crate::schema::{short_key, RemoteObject};

/// How well a remote name matches a logical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameMatch {
    None,
    /// One name contains the other (case-insensitive)
    Partial,
    /// Equal after lowercasing, on the full or the short form
    Exact,
}

/// Compare a logical name with one remote name (key or label).
pub fn object_name_matches(logical_name: &str, remote_name: &str) -> NameMatch {
    let logical = logical_name.trim().to_lowercase();
    let remote = remote_name.trim().to_lowercase();
    if logical.is_empty() || remote.is_empty() {
        return NameMatch::None;
    }

    let remote_short = short_key(&remote);
    let logical_short = short_key(&logical);

    if remote == logical || remote_short == logical_short {
        NameMatch::Exact
    } else if remote_short.contains(logical_short) || logical_short.contains(remote_short) {
        NameMatch::Partial
    } else {
        NameMatch::None
    }
}

/// Strongest match of any of the object's names.
fn best_match(logical_name: &str, object: &RemoteObject) -> NameMatch {
    object
        .names()
        .into_iter()
        .map(|name| object_name_matches(logical_name, name))
        .max()
        .unwrap_or(NameMatch::None)
}

/// Pick the listed object for a logical name.
///
/// An exact match anywhere in the listing wins; otherwise the first partial
/// match in listing order. Several partial matches are logged since the
/// pick between them is arbitrary.
pub fn select_object<'a>(logical_name: &str, objects: &'a [RemoteObject]) -> Option<&'a RemoteObject> {
    if let Some(exact) = objects
        .iter()
        .find(|o| best_match(logical_name, o) == NameMatch::Exact)
    {
        return Some(exact);
    }

    let partials: Vec<&RemoteObject> = objects
        .iter()
        .filter(|o| best_match(logical_name, o) == NameMatch::Partial)
        .collect();

    if partials.len() > 1 {
        tracing::warn!(
            logical_name,
            candidates = ?partials.iter().map(|o| o.key.as_deref().unwrap_or("?")).collect::<Vec<_>>(),
            "several object types partially match; taking the first"
        );
    }
    partials.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Labels;

    fn object(key: &str) -> RemoteObject {
        RemoteObject {
            key: Some(key.to_string()),
            ..RemoteObject::default()
        }
    }

    #[test]
    fn match_strength_is_case_insensitive() {
        assert_eq!(object_name_matches("quotes", "custom_objects.Quotes"), NameMatch::Exact);
        assert_eq!(object_name_matches("Quotes", "quotes"), NameMatch::Exact);
        assert_eq!(object_name_matches("quote", "custom_objects.quotes"), NameMatch::Partial);
        assert_eq!(object_name_matches("quotes", "Quote"), NameMatch::Partial);
        assert_eq!(object_name_matches("quotes", "jobs"), NameMatch::None);
        assert_eq!(object_name_matches("", "jobs"), NameMatch::None);
    }

    #[test]
    fn exact_match_beats_earlier_partial() {
        let objects = vec![object("custom_objects.quotes_archive"), object("custom_objects.quotes")];
        let picked = select_object("quotes", &objects).unwrap();
        assert_eq!(picked.key.as_deref(), Some("custom_objects.quotes"));
    }

    #[test]
    fn first_partial_wins_without_exact() {
        let objects = vec![
            object("custom_objects.jobs"),
            object("custom_objects.quote_items"),
            object("custom_objects.old_quotes"),
        ];
        let picked = select_object("quote", &objects).unwrap();
        assert_eq!(picked.key.as_deref(), Some("custom_objects.quote_items"));
    }

    #[test]
    fn labels_participate_in_matching() {
        let mut labelled = object("custom_objects.q_v2");
        labelled.labels = Some(Labels {
            singular: Some("Quote".to_string()),
            plural: Some("Quotes".to_string()),
        });
        let objects = vec![labelled];
        assert!(select_object("quotes", &objects).is_some());
        assert!(select_object("invoices", &objects).is_none());
    }
}
