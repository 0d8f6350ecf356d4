use serde::{Deserialize, Serialize};

use supplydesk_core::{CategoryId, DomainError, DomainResult, Entity};

/// Supply category. `is_material` marks categories of borrowable materials
/// (tables, chairs) so they are offered as equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub is_material: bool,
}

impl Category {
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        description: impl Into<String>,
        is_material: bool,
    ) -> DomainResult<Self> {
        let mut c = Self {
            id,
            name: String::new(),
            description: description.into(),
            is_material,
        };
        c.rename(name)?;
        Ok(c)
    }

    pub fn rename(&mut self, name: impl Into<String>) -> DomainResult<()> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_required() {
        let c = Category::new(CategoryId::new(), "  Furniture ", "", true).unwrap();
        assert_eq!(c.name, "Furniture");
        assert!(Category::new(CategoryId::new(), " ", "", false).is_err());
    }
}
