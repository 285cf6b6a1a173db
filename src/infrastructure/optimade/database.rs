use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::QueryError;

/// Databases structures may be fetched from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Database {
    /// Crystallography Open Database
    Cod,
    /// Materials Project
    Mp,
    /// Open Quantum Materials Database
    Oqmd,
}

impl Database {
    pub fn parse(name: &str) -> Result<Database, QueryError> {
        let name = name.trim().to_lowercase();
        return Database::iter()
            .find(|db| return db.to_string() == name)
            .ok_or(QueryError::UnknownDatabase(name));
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Database::Cod => return "https://www.crystallography.net/cod/optimade/",
            Database::Mp => return "https://optimade.materialsproject.org",
            Database::Oqmd => return "https://oqmd.org/optimade",
        }
    }

    pub fn supports_formula_search(&self) -> bool {
        return *self != Database::Cod;
    }
}
