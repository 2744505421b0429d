use crate::repository::Library;
use ffragrance_schemas::chemical::{Chemical, PyramidNote};

/// Chemicals whose name, CAS number, category name or any tag name contains
/// `text`, ignoring case. Blank text matches everything. Ordered by name.
pub fn search<'a>(library: &'a Library, text: &str) -> Vec<&'a Chemical> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return library.chemicals();
    }
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    library
        .chemicals()
        .into_iter()
        .filter(|chemical| {
            contains(&chemical.name)
                || contains(&chemical.cas_number)
                || chemical
                    .category_id
                    .and_then(|id| library.category(&id))
                    .map_or(false, |category| contains(&category.name))
                || library.tags_of(chemical).iter().any(|tag| contains(&tag.name))
        })
        .collect()
}

/// Groups chemicals by tier, top first. Empty tiers are omitted and each
/// group is sorted by name.
pub fn group_by_pyramid_note<'a>(chemicals: &[&'a Chemical]) -> Vec<(PyramidNote, Vec<&'a Chemical>)> {
    PyramidNote::ALL
        .into_iter()
        .filter_map(|note| {
            let mut group: Vec<&Chemical> = chemicals
                .iter()
                .copied()
                .filter(|chemical| chemical.pyramid_note == note)
                .collect();
            if group.is_empty() {
                return None;
            }
            group.sort_by_key(|chemical| chemical.name.to_lowercase());
            Some((note, group))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;
    use ffragrance_schemas::{category::Category, color::Rgba, tag::Tag};

    fn sample_library() -> Library {
        let mut library = Library::new();
        let citrus = Category::new("Citrus", Rgba::GRAY);
        let sparkling = Tag::new("Sparkling", Rgba::GRAY);

        let mut limonene = Chemical::new("Limonene")
            .with_cas_number("5989-27-5")
            .with_pyramid_note(PyramidNote::Top)
            .with_category(citrus.id);
        limonene.add_tag(sparkling.id);
        let vanillin = Chemical::new("Vanillin")
            .with_cas_number("121-33-5")
            .with_pyramid_note(PyramidNote::Base);
        let hedione = Chemical::new("Hedione").with_pyramid_note(PyramidNote::Mid);
        let aldehyde = Chemical::new("Aldehyde C-12").with_pyramid_note(PyramidNote::Top);

        library.put(citrus).unwrap();
        library.put(sparkling).unwrap();
        for chemical in [limonene, vanillin, hedione, aldehyde] {
            library.put(chemical).unwrap();
        }
        library
    }

    fn names(chemicals: &[&Chemical]) -> Vec<String> {
        chemicals.iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn test_blank_search_returns_all_sorted() {
        let library = sample_library();
        assert_eq!(
            names(&search(&library, "  ")),
            vec!["Aldehyde C-12", "Hedione", "Limonene", "Vanillin"]
        );
    }

    #[test]
    fn test_search_fields() {
        let library = sample_library();
        assert_eq!(names(&search(&library, "VANIL")), vec!["Vanillin"]);
        assert_eq!(names(&search(&library, "121-33")), vec!["Vanillin"]);
        assert_eq!(names(&search(&library, "citrus")), vec!["Limonene"]);
        assert_eq!(names(&search(&library, "sparkl")), vec!["Limonene"]);
        assert!(search(&library, "oud").is_empty());
    }

    #[test]
    fn test_group_by_pyramid_note_order() {
        let library = sample_library();
        let groups = group_by_pyramid_note(&library.chemicals());
        let notes: Vec<PyramidNote> = groups.iter().map(|(note, _)| *note).collect();
        assert_eq!(notes, vec![PyramidNote::Top, PyramidNote::Mid, PyramidNote::Base]);
        assert_eq!(names(&groups[0].1), vec!["Aldehyde C-12", "Limonene"]);
    }
}
