//! Tag maps carried by [`Type::Tagged`](super::Type::Tagged).

use std::collections::BTreeMap;

use super::Type;

/// Tag name to tag type mapping.
///
/// Ordered so that tagged types serialize and hash deterministically.
pub type TagTypes = BTreeMap<String, Type>;

/// Merges tag maps in order; the first map to define a name wins.
pub fn merge_tags<'a>(sources: impl IntoIterator<Item = &'a TagTypes>) -> TagTypes {
    let mut merged = TagTypes::new();
    for tags in sources {
        for (name, ty) in tags {
            merged.entry(name.clone()).or_insert_with(|| ty.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_tags_first_wins() {
        let first = TagTypes::from([("run".to_owned(), Type::object("run"))]);
        let second = TagTypes::from([
            ("run".to_owned(), Type::String),
            ("project".to_owned(), Type::object("project")),
        ]);

        let merged = merge_tags([&first, &second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["run"], Type::object("run"));
        assert_eq!(merged["project"], Type::object("project"));
    }

    #[test]
    fn test_merge_tags_empty() {
        assert!(merge_tags(std::iter::empty::<&TagTypes>()).is_empty());
    }
}
