/// URL slug: lowercase alphanumeric words joined by single dashes.
///
/// `"The Forest Hiker"` -> `"the-forest-hiker"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lowercases_and_dashes() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  The   Sea Explorer! "), "the-sea-explorer");
        assert_eq!(slugify("Snow-Adventurer 2"), "snow-adventurer-2");
    }

    proptest! {
        #[test]
        fn slug_has_no_edge_or_double_dashes(name in ".{0,60}") {
            let slug = slugify(&name);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(!slug.chars().any(char::is_whitespace));
        }
    }
}
