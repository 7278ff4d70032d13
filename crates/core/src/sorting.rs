use std::cmp::Ordering;

/// Case-insensitive ordering of optional names, missing names first.
///
/// Used to present roles and permissions in a stable order regardless of how
/// the identity platform returns them.
pub fn cmp_nulls_first_ci(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase)),
    }
}
