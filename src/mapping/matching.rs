//! Field match predicate
//!
//! Three passes, in priority order across all fields: full remote key,
//! short key, then normalized display name (with containment either way to
//! tolerate drift between code and admin-configured labels).

use crate::schema::FieldDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    FullKey,
    ShortKey,
    DisplayName,
}

impl MatchPass {
    pub const ORDER: [MatchPass; 3] = [MatchPass::FullKey, MatchPass::ShortKey, MatchPass::DisplayName];
}

/// Lowercase and replace runs of whitespace with a single underscore.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Does `logical_key` match `field` under `pass`?
pub fn field_matches(logical_key: &str, field: &FieldDescriptor, pass: MatchPass) -> bool {
    match pass {
        MatchPass::FullKey => field.remote_key == logical_key,
        MatchPass::ShortKey => field.short_key() == logical_key,
        MatchPass::DisplayName => {
            let label = normalize_label(&field.display_name);
            let key = normalize_label(logical_key);
            if label.is_empty() || key.is_empty() {
                return false;
            }
            label == key || label.contains(&key) || key.contains(&label)
        }
    }
}

/// Find the field for `logical_key`, running each pass over every field
/// before moving on to the next pass.
pub fn find_field<'a>(
    logical_key: &str,
    fields: &'a [FieldDescriptor],
) -> Option<(&'a FieldDescriptor, MatchPass)> {
    MatchPass::ORDER.iter().find_map(|&pass| {
        fields
            .iter()
            .find(|f| field_matches(logical_key, f, pass))
            .map(|f| (f, pass))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDataType;

    fn field(key: &str, label: &str) -> FieldDescriptor {
        FieldDescriptor::new(key, label, FieldDataType::Text)
    }

    #[test]
    fn normalization_lowercases_and_underscores() {
        assert_eq!(normalize_label("  Shedding   Pets "), "shedding_pets");
        assert_eq!(normalize_label("Price"), "price");
        assert_eq!(normalize_label("   "), "");
    }

    #[test]
    fn passes_match_their_own_forms() {
        let f = field("custom_objects.quotes.price_low", "Lowest Price");
        assert!(field_matches("custom_objects.quotes.price_low", &f, MatchPass::FullKey));
        assert!(!field_matches("price_low", &f, MatchPass::FullKey));
        assert!(field_matches("price_low", &f, MatchPass::ShortKey));
        assert!(field_matches("lowest price", &f, MatchPass::DisplayName));
    }

    #[test]
    fn display_name_containment_works_both_ways() {
        let f = field("custom_objects.quotes.x1", "Number of Shedding Pets");
        assert!(field_matches("shedding_pets", &f, MatchPass::DisplayName));

        let g = field("custom_objects.quotes.x2", "Pets");
        assert!(field_matches("shedding_pets", &g, MatchPass::DisplayName));
    }

    #[test]
    fn empty_label_never_matches() {
        let f = field("custom_objects.quotes.x1", "");
        assert!(!field_matches("anything", &f, MatchPass::DisplayName));
    }

    #[test]
    fn earlier_pass_wins_over_earlier_field() {
        // The first field matches by label, the second by short key; the
        // short-key pass runs first so the second field wins.
        let fields = vec![
            field("custom_objects.quotes.legacy", "Price Low"),
            field("custom_objects.quotes.price_low", "Minimum"),
        ];
        let (found, pass) = find_field("price_low", &fields).unwrap();
        assert_eq!(found.remote_key, "custom_objects.quotes.price_low");
        assert_eq!(pass, MatchPass::ShortKey);
    }

    #[test]
    fn unmatched_key_returns_none() {
        let fields = vec![field("custom_objects.quotes.quote_id", "Quote ID")];
        assert!(find_field("zip_code", &fields).is_none());
    }
}
