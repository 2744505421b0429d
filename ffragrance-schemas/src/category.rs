use crate::{color::Rgba, Record};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CATEGORY_COLOR: &str = "#808080";

fn default_color_hex() -> String {
    DEFAULT_CATEGORY_COLOR.to_string()
}

/// An olfactive family such as "Citrus" or "Musk". A chemical belongs to at
/// most one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_color_hex")]
    pub color_hex: String,
}

impl Category {
    pub fn new(name: impl Into<String>, color: Rgba) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color_hex: color.to_hex(),
        }
    }

    /// Swatch colour; grey when the stored hex is unreadable.
    pub fn color(&self) -> Rgba {
        Rgba::from_hex(&self.color_hex).unwrap_or(Rgba::GRAY)
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.color_hex = color.to_hex();
    }
}

impl Record for Category {
    const KIND: &'static str = "category";

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
