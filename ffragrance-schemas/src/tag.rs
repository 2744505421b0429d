use crate::{color::Rgba, Record};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TAG_COLOR: &str = "#007AFF";

fn default_alpha() -> f64 {
    1.0
}

/// Free-form label; a chemical may carry any number of tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub red: f64,
    #[serde(default)]
    pub green: f64,
    #[serde(default)]
    pub blue: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

impl Tag {
    pub fn new(name: impl Into<String>, color: Rgba) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            red: color.red,
            green: color.green,
            blue: color.blue,
            alpha: color.alpha,
        }
    }

    pub fn color(&self) -> Rgba {
        Rgba {
            red: self.red,
            green: self.green,
            blue: self.blue,
            alpha: self.alpha,
        }
    }
}

impl Record for Tag {
    const KIND: &'static str = "tag";

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
