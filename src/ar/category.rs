//! Totem category detection for the placed marker's icon

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ahorro,
    Inversion,
    Credito,
    Presupuesto,
    Seguros,
    Deuda,
    General,
}

/// Keyword vocabulary, checked in order against the lowercased totem code
const KEYWORDS: &[(&str, Category)] = &[
    ("ahorro", Category::Ahorro),
    ("inversion", Category::Inversion),
    ("credito", Category::Credito),
    ("presupuesto", Category::Presupuesto),
    ("seguro", Category::Seguros),
    ("deuda", Category::Deuda),
];

impl Category {
    /// Pick the category whose keyword appears in `code`; unknown codes are `General`
    pub fn from_totem_code(code: &str) -> Self {
        let code = code.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(keyword, _)| code.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(Category::General)
    }

    /// Texture shown on the marker quad
    pub fn icon_path(&self) -> &'static str {
        match self {
            Category::Ahorro => "/icons/ahorro.png",
            Category::Inversion => "/icons/inversion.png",
            Category::Credito => "/icons/credito.png",
            Category::Presupuesto => "/icons/presupuesto.png",
            Category::Seguros => "/icons/seguros.png",
            Category::Deuda => "/icons/deuda.png",
            Category::General => "/icons/default.png",
        }
    }
}
