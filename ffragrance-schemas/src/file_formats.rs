use crate::{category::Category, chemical::Chemical, formula::Formula, tag::Tag};
use serde::{Deserialize, Serialize};

pub const LIBRARY_SCHEMA_VERSION: &str = "1";

/// On-disk shape of a whole library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    pub schema_version: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub chemicals: Vec<Chemical>,
    #[serde(default)]
    pub formulas: Vec<Formula>,
}
