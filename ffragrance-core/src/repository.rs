//! Storage seam for inventory records.
//!
//! The composition engine only ever sees the `Repository` trait. `Library` is
//! the in-memory implementation used by the application: it owns every
//! record, refuses deletes that would leave dangling references, and keeps the
//! lookup-only back-reference indexes (category -> chemicals, tag ->
//! chemicals, chemical -> formulas) in step with each write.

use crate::{composition, error::FfragranceError};
use ffragrance_schemas::{
    category::Category,
    chemical::Chemical,
    color::Rgba,
    file_formats::{LibraryFile, LIBRARY_SCHEMA_VERSION},
    formula::Formula,
    tag::Tag,
    Record,
};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

pub trait Repository<T: Record> {
    fn get(&self, id: &Uuid) -> Option<&T>;

    /// Inserts or replaces the record with the same id.
    fn put(&mut self, record: T) -> Result<(), FfragranceError>;

    fn delete(&mut self, id: &Uuid) -> Result<T, FfragranceError>;

    fn query(&self, predicate: &dyn Fn(&T) -> bool) -> Vec<&T>;
}

/// A bare keyed store with no reference checks.
impl<T: Record> Repository<T> for HashMap<Uuid, T> {
    fn get(&self, id: &Uuid) -> Option<&T> {
        HashMap::get(self, id)
    }

    fn put(&mut self, record: T) -> Result<(), FfragranceError> {
        self.insert(record.id(), record);
        Ok(())
    }

    fn delete(&mut self, id: &Uuid) -> Result<T, FfragranceError> {
        self.remove(id).ok_or_else(|| not_found::<T>(id))
    }

    fn query(&self, predicate: &dyn Fn(&T) -> bool) -> Vec<&T> {
        self.values().filter(|record| predicate(record)).collect()
    }
}

fn not_found<T: Record>(id: &Uuid) -> FfragranceError {
    FfragranceError::NotFound {
        kind: T::KIND,
        key: id.to_string(),
    }
}

fn sorted_by_name<T: Record>(mut records: Vec<&T>) -> Vec<&T> {
    records.sort_by_key(|record| record.name().to_lowercase());
    records
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    chemicals: HashMap<Uuid, Chemical>,
    categories: HashMap<Uuid, Category>,
    tags: HashMap<Uuid, Tag>,
    formulas: HashMap<Uuid, Formula>,
    category_members: HashMap<Uuid, BTreeSet<Uuid>>,
    tag_members: HashMap<Uuid, BTreeSet<Uuid>>,
    chemical_usage: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a library from its file form, checking every reference.
    pub fn from_file(file: LibraryFile) -> Result<Self, FfragranceError> {
        let mut library = Self::new();
        for category in file.categories {
            library.put(category)?;
        }
        for tag in file.tags {
            library.put(tag)?;
        }
        for chemical in file.chemicals {
            library.put(chemical)?;
        }
        for formula in file.formulas {
            library.put(formula)?;
        }
        debug!(
            chemicals = library.chemicals.len(),
            formulas = library.formulas.len(),
            "library loaded"
        );
        Ok(library)
    }

    pub fn to_file(&self) -> LibraryFile {
        LibraryFile {
            schema_version: LIBRARY_SCHEMA_VERSION.to_string(),
            categories: self.categories().into_iter().cloned().collect(),
            tags: self.tags().into_iter().cloned().collect(),
            chemicals: self.chemicals().into_iter().cloned().collect(),
            formulas: self.formulas().into_iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chemicals.is_empty()
            && self.categories.is_empty()
            && self.tags.is_empty()
            && self.formulas.is_empty()
    }

    pub fn chemical(&self, id: &Uuid) -> Option<&Chemical> {
        self.chemicals.get(id)
    }

    pub fn category(&self, id: &Uuid) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn tag(&self, id: &Uuid) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn formula(&self, id: &Uuid) -> Option<&Formula> {
        self.formulas.get(id)
    }

    pub fn chemicals(&self) -> Vec<&Chemical> {
        sorted_by_name(self.chemicals.values().collect())
    }

    pub fn categories(&self) -> Vec<&Category> {
        sorted_by_name(self.categories.values().collect())
    }

    pub fn tags(&self) -> Vec<&Tag> {
        sorted_by_name(self.tags.values().collect())
    }

    pub fn formulas(&self) -> Vec<&Formula> {
        sorted_by_name(self.formulas.values().collect())
    }

    pub fn chemicals_in_category(&self, category_id: &Uuid) -> Vec<&Chemical> {
        self.members(&self.category_members, category_id)
    }

    pub fn chemicals_with_tag(&self, tag_id: &Uuid) -> Vec<&Chemical> {
        self.members(&self.tag_members, tag_id)
    }

    pub fn tags_of(&self, chemical: &Chemical) -> Vec<&Tag> {
        chemical.tag_ids.iter().filter_map(|id| self.tags.get(id)).collect()
    }

    pub fn formulas_using_chemical(&self, chemical_id: &Uuid) -> Vec<&Formula> {
        let formulas = self
            .chemical_usage
            .get(chemical_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.formulas.get(id))
            .collect();
        sorted_by_name(formulas)
    }

    fn members(&self, index: &HashMap<Uuid, BTreeSet<Uuid>>, key: &Uuid) -> Vec<&Chemical> {
        let chemicals = index
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.chemicals.get(id))
            .collect();
        sorted_by_name(chemicals)
    }

    /// Resolves an operator-supplied key: an id, or else a case-insensitive
    /// name. The first match in name order wins when names collide.
    pub fn find<T>(&self, key: &str) -> Result<&T, FfragranceError>
    where
        T: Record,
        Self: Repository<T>,
    {
        if let Ok(id) = key.trim().parse::<Uuid>() {
            if let Some(record) = <Self as Repository<T>>::get(self, &id) {
                return Ok(record);
            }
        }
        let wanted = key.trim().to_lowercase();
        let matches = <Self as Repository<T>>::query(self, &|record: &T| {
            record.name().to_lowercase() == wanted
        });
        sorted_by_name(matches)
            .into_iter()
            .next()
            .ok_or_else(|| FfragranceError::NotFound {
                kind: T::KIND,
                key: key.to_string(),
            })
    }

    /// Applies `edit` to a copy of the record and commits it with `put`. If
    /// `edit` fails the stored record is left as it was.
    pub fn modify<T, R>(
        &mut self,
        id: &Uuid,
        edit: impl FnOnce(&mut T) -> Result<R, FfragranceError>,
    ) -> Result<R, FfragranceError>
    where
        T: Record,
        Self: Repository<T>,
    {
        let mut record = <Self as Repository<T>>::get(self, id)
            .cloned()
            .ok_or_else(|| not_found::<T>(id))?;
        let outcome = edit(&mut record)?;
        <Self as Repository<T>>::put(self, record)?;
        Ok(outcome)
    }

    fn index_chemical(&mut self, chemical: &Chemical) {
        if let Some(category_id) = chemical.category_id {
            self.category_members
                .entry(category_id)
                .or_default()
                .insert(chemical.id);
        }
        for tag_id in &chemical.tag_ids {
            self.tag_members.entry(*tag_id).or_default().insert(chemical.id);
        }
    }

    fn unindex_chemical(&mut self, chemical: &Chemical) {
        if let Some(category_id) = chemical.category_id {
            remove_member(&mut self.category_members, &category_id, &chemical.id);
        }
        for tag_id in &chemical.tag_ids {
            remove_member(&mut self.tag_members, tag_id, &chemical.id);
        }
    }

    fn index_formula(&mut self, formula: &Formula) {
        for chemical_id in formula.chemical_ids() {
            self.chemical_usage
                .entry(chemical_id)
                .or_default()
                .insert(formula.id);
        }
    }

    fn unindex_formula(&mut self, formula: &Formula) {
        for chemical_id in formula.chemical_ids() {
            remove_member(&mut self.chemical_usage, &chemical_id, &formula.id);
        }
    }
}

fn remove_member(index: &mut HashMap<Uuid, BTreeSet<Uuid>>, key: &Uuid, member: &Uuid) {
    if let Some(members) = index.get_mut(key) {
        members.remove(member);
        if members.is_empty() {
            index.remove(key);
        }
    }
}

impl Repository<Category> for Library {
    fn get(&self, id: &Uuid) -> Option<&Category> {
        self.categories.get(id)
    }

    fn put(&mut self, category: Category) -> Result<(), FfragranceError> {
        Rgba::from_hex(&category.color_hex)?;
        self.categories.insert(category.id, category);
        Ok(())
    }

    fn delete(&mut self, id: &Uuid) -> Result<Category, FfragranceError> {
        let category = self.categories.get(id).ok_or_else(|| not_found::<Category>(id))?;
        let members = self.chemicals_in_category(id);
        if !members.is_empty() {
            return Err(FfragranceError::DeleteBlockedByReference {
                kind: Category::KIND,
                name: category.name.clone(),
                dependents: members.iter().map(|c| c.name.clone()).collect(),
            });
        }
        self.categories.remove(id).ok_or_else(|| not_found::<Category>(id))
    }

    fn query(&self, predicate: &dyn Fn(&Category) -> bool) -> Vec<&Category> {
        self.categories.values().filter(|c| predicate(c)).collect()
    }
}

impl Repository<Tag> for Library {
    fn get(&self, id: &Uuid) -> Option<&Tag> {
        self.tags.get(id)
    }

    fn put(&mut self, tag: Tag) -> Result<(), FfragranceError> {
        self.tags.insert(tag.id, tag);
        Ok(())
    }

    /// Tags are labels, so deleting one detaches it from its chemicals rather
    /// than being refused.
    fn delete(&mut self, id: &Uuid) -> Result<Tag, FfragranceError> {
        let tag = self.tags.remove(id).ok_or_else(|| not_found::<Tag>(id))?;
        for chemical_id in self.tag_members.remove(id).unwrap_or_default() {
            if let Some(chemical) = self.chemicals.get_mut(&chemical_id) {
                chemical.remove_tag(*id);
            }
        }
        debug!(tag = %tag.name, "tag deleted and detached");
        Ok(tag)
    }

    fn query(&self, predicate: &dyn Fn(&Tag) -> bool) -> Vec<&Tag> {
        self.tags.values().filter(|t| predicate(t)).collect()
    }
}

impl Repository<Chemical> for Library {
    fn get(&self, id: &Uuid) -> Option<&Chemical> {
        self.chemicals.get(id)
    }

    fn put(&mut self, chemical: Chemical) -> Result<(), FfragranceError> {
        let referenced_by = || format!("chemical '{}'", chemical.name);
        if let Some(category_id) = chemical.category_id {
            if !self.categories.contains_key(&category_id) {
                return Err(FfragranceError::UnknownReference {
                    kind: Category::KIND,
                    id: category_id,
                    referenced_by: referenced_by(),
                });
            }
        }
        if let Some(tag_id) = chemical.tag_ids.iter().find(|id| !self.tags.contains_key(id)) {
            return Err(FfragranceError::UnknownReference {
                kind: Tag::KIND,
                id: *tag_id,
                referenced_by: referenced_by(),
            });
        }

        if let Some(previous) = self.chemicals.remove(&chemical.id) {
            self.unindex_chemical(&previous);
        }
        self.index_chemical(&chemical);
        self.chemicals.insert(chemical.id, chemical);
        Ok(())
    }

    fn delete(&mut self, id: &Uuid) -> Result<Chemical, FfragranceError> {
        let chemical = self.chemicals.get(id).ok_or_else(|| not_found::<Chemical>(id))?;
        let users = self.formulas_using_chemical(id);
        if !users.is_empty() {
            return Err(FfragranceError::DeleteBlockedByReference {
                kind: Chemical::KIND,
                name: chemical.name.clone(),
                dependents: users.iter().map(|f| f.name.clone()).collect(),
            });
        }
        let chemical = self.chemicals.remove(id).ok_or_else(|| not_found::<Chemical>(id))?;
        self.unindex_chemical(&chemical);
        Ok(chemical)
    }

    fn query(&self, predicate: &dyn Fn(&Chemical) -> bool) -> Vec<&Chemical> {
        self.chemicals.values().filter(|c| predicate(c)).collect()
    }
}

impl Repository<Formula> for Library {
    fn get(&self, id: &Uuid) -> Option<&Formula> {
        self.formulas.get(id)
    }

    fn put(&mut self, formula: Formula) -> Result<(), FfragranceError> {
        composition::validate_quantities(&formula)?;
        if let Some(chemical_id) = formula
            .chemical_ids()
            .find(|id| !self.chemicals.contains_key(id))
        {
            return Err(FfragranceError::UnknownReference {
                kind: Chemical::KIND,
                id: chemical_id,
                referenced_by: format!("formula '{}'", formula.name),
            });
        }

        if let Some(previous) = self.formulas.remove(&formula.id) {
            self.unindex_formula(&previous);
        }
        self.index_formula(&formula);
        self.formulas.insert(formula.id, formula);
        Ok(())
    }

    /// Removes the formula together with the lines it owns.
    fn delete(&mut self, id: &Uuid) -> Result<Formula, FfragranceError> {
        let formula = self.formulas.remove(id).ok_or_else(|| not_found::<Formula>(id))?;
        self.unindex_formula(&formula);
        debug!(formula = %formula.name, lines = formula.lines.len(), "formula deleted");
        Ok(formula)
    }

    fn query(&self, predicate: &dyn Fn(&Formula) -> bool) -> Vec<&Formula> {
        self.formulas.values().filter(|f| predicate(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffragrance_schemas::{color::Rgba, formula::FormulaLine};

    fn library_with_formula() -> (Library, Uuid, Uuid, Uuid) {
        let mut library = Library::new();
        let citrus = Category::new("Citrus", Rgba::opaque(1.0, 0.8, 0.0));
        let limonene = Chemical::new("Limonene").with_category(citrus.id);
        let mut formula = Formula::new("Eau Fraiche");
        formula.lines.push(FormulaLine::new(limonene.id, 5.0, 100.0));

        let ids = (citrus.id, limonene.id, formula.id);
        library.put(citrus).unwrap();
        library.put(limonene).unwrap();
        library.put(formula).unwrap();
        (library, ids.0, ids.1, ids.2)
    }

    #[test]
    fn test_category_delete_blocked_while_it_has_chemicals() {
        let (mut library, category_id, _, _) = library_with_formula();
        let err = Repository::<Category>::delete(&mut library, &category_id).unwrap_err();
        match err {
            FfragranceError::DeleteBlockedByReference { name, dependents, .. } => {
                assert_eq!(name, "Citrus");
                assert_eq!(dependents, vec!["Limonene".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(library.category(&category_id).is_some());
    }

    #[test]
    fn test_category_with_malformed_colour_is_rejected() {
        let mut library = Library::new();
        let mut category = Category::new("Resins", Rgba::GRAY);
        category.color_hex = "#12345".to_string();
        let err = library.put(category).unwrap_err();
        assert!(matches!(err, FfragranceError::InvalidColor(_)));
        assert!(library.categories().is_empty());
    }

    #[test]
    fn test_empty_category_can_be_deleted() {
        let mut library = Library::new();
        let empty = Category::new("Aldehydes", Rgba::GRAY);
        let id = empty.id;
        library.put(empty).unwrap();
        let removed = Repository::<Category>::delete(&mut library, &id).unwrap();
        assert_eq!(removed.name, "Aldehydes");
        assert!(library.category(&id).is_none());
    }

    #[test]
    fn test_chemical_delete_blocked_while_used_in_formula() {
        let (mut library, _, chemical_id, formula_id) = library_with_formula();
        let err = Repository::<Chemical>::delete(&mut library, &chemical_id).unwrap_err();
        assert!(matches!(err, FfragranceError::DeleteBlockedByReference { .. }));
        assert!(err.to_string().contains("Eau Fraiche"));

        Repository::<Formula>::delete(&mut library, &formula_id).unwrap();
        assert!(library.formulas_using_chemical(&chemical_id).is_empty());
        Repository::<Chemical>::delete(&mut library, &chemical_id).unwrap();
    }

    #[test]
    fn test_moving_chemical_between_categories_updates_index() {
        let (mut library, citrus_id, chemical_id, _) = library_with_formula();
        let woods = Category::new("Woods", Rgba::GRAY);
        let woods_id = woods.id;
        library.put(woods).unwrap();

        library
            .modify(&chemical_id, |chemical: &mut Chemical| {
                chemical.category_id = Some(woods_id);
                Ok(())
            })
            .unwrap();

        assert!(library.chemicals_in_category(&citrus_id).is_empty());
        assert_eq!(library.chemicals_in_category(&woods_id).len(), 1);
        Repository::<Category>::delete(&mut library, &citrus_id).unwrap();
    }

    #[test]
    fn test_tag_delete_detaches_chemicals() {
        let (mut library, _, chemical_id, _) = library_with_formula();
        let fresh = Tag::new("fresh", Rgba::opaque(0.0, 0.5, 1.0));
        let tag_id = fresh.id;
        library.put(fresh).unwrap();
        library
            .modify(&chemical_id, |chemical: &mut Chemical| {
                chemical.add_tag(tag_id);
                Ok(())
            })
            .unwrap();
        assert_eq!(library.chemicals_with_tag(&tag_id).len(), 1);

        Repository::<Tag>::delete(&mut library, &tag_id).unwrap();
        assert!(library.chemical(&chemical_id).unwrap().tag_ids.is_empty());
        assert!(library.chemicals_with_tag(&tag_id).is_empty());
    }

    #[test]
    fn test_dangling_references_are_rejected() {
        let mut library = Library::new();
        let orphan = Chemical::new("Ambroxan").with_category(Uuid::new_v4());
        let err = library.put(orphan).unwrap_err();
        assert!(matches!(err, FfragranceError::UnknownReference { kind: "category", .. }));

        let mut formula = Formula::new("Ghost");
        formula.lines.push(FormulaLine::new(Uuid::new_v4(), 1.0, 100.0));
        assert!(library.put(formula).is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn test_find_by_id_or_name() {
        let (library, _, chemical_id, _) = library_with_formula();
        let by_name: &Chemical = library.find("limonene").unwrap();
        assert_eq!(by_name.id, chemical_id);
        let by_id: &Chemical = library.find(&chemical_id.to_string()).unwrap();
        assert_eq!(by_id.name, "Limonene");
        assert!(library.find::<Formula>("missing").is_err());
    }

    #[test]
    fn test_failed_modify_leaves_record_unchanged() {
        let (mut library, _, _, formula_id) = library_with_formula();
        let result = library.modify(&formula_id, |formula: &mut Formula| {
            formula.lines.clear();
            Err::<(), _>(FfragranceError::InvalidScaleTarget { current: 0.0, target: 1.0 })
        });
        assert!(result.is_err());
        assert_eq!(library.formula(&formula_id).unwrap().lines.len(), 1);
    }

    #[test]
    fn test_formula_with_bad_quantities_is_not_stored() {
        let (mut library, _, chemical_id, formula_id) = library_with_formula();
        let before = library.formula(&formula_id).unwrap().clone();

        let mut poisoned = before.clone();
        poisoned.lines.push(FormulaLine::new(chemical_id, f64::NAN, 100.0));
        let err = library.put(poisoned).unwrap_err();
        assert!(matches!(err, FfragranceError::NonFiniteInput { field: "amount", .. }));

        let mut negative = before.clone();
        negative.diluent_weight = -90.0;
        let err = library.put(negative).unwrap_err();
        assert!(matches!(err, FfragranceError::NegativeQuantity { field: "diluent weight", .. }));

        assert_eq!(library.formula(&formula_id), Some(&before));
        assert_eq!(library.formulas_using_chemical(&chemical_id).len(), 1);
    }

    #[test]
    fn test_file_with_infinite_dilution_is_rejected() {
        let (library, _, _, _) = library_with_formula();
        let mut file = library.to_file();
        file.formulas[0].lines[0].dilution_percentage = f64::INFINITY;
        assert!(matches!(
            Library::from_file(file),
            Err(FfragranceError::NonFiniteInput { field: "dilution", .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let (library, _, chemical_id, formula_id) = library_with_formula();
        let restored = Library::from_file(library.to_file()).unwrap();
        assert_eq!(restored.chemical(&chemical_id), library.chemical(&chemical_id));
        assert_eq!(restored.formulas_using_chemical(&chemical_id)[0].id, formula_id);
    }
}
