use std::collections::BTreeMap;

use super::domain::Department;

/// Read-only directory of departments that receive submitted reports.
pub trait DepartmentCatalog: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Department, CatalogError>;
    fn list(&self) -> Result<Vec<Department>, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("department {0} not found")]
    NotFound(String),
    #[error("department catalog unavailable: {0}")]
    Unavailable(String),
}

pub const SECURITY_DEPARTMENT_ID: &str = "5f1c6a0e-3b8d-4e7a-9c21-0d4b7f2e8a11";
pub const BACKEND_DEPARTMENT_ID: &str = "8a2d4c6e-1f3b-4d5a-8e7c-2b9f0a1c3d44";
pub const FRONTEND_DEPARTMENT_ID: &str = "c3e5a7b9-2d4f-4a6c-9e8b-7f1d3c5a9b77";

/// Fixed in-process catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticDepartmentCatalog {
    departments: BTreeMap<String, Department>,
}

impl StaticDepartmentCatalog {
    pub fn new(departments: impl IntoIterator<Item = Department>) -> Self {
        Self {
            departments: departments
                .into_iter()
                .map(|department| (department.id.clone(), department))
                .collect(),
        }
    }

    /// Security, Backend, and Frontend review desks.
    pub fn seeded() -> Self {
        Self::new([
            Department {
                id: SECURITY_DEPARTMENT_ID.to_string(),
                name: "Security".to_string(),
            },
            Department {
                id: BACKEND_DEPARTMENT_ID.to_string(),
                name: "Backend".to_string(),
            },
            Department {
                id: FRONTEND_DEPARTMENT_ID.to_string(),
                name: "Frontend".to_string(),
            },
        ])
    }
}

impl DepartmentCatalog for StaticDepartmentCatalog {
    fn get_by_id(&self, id: &str) -> Result<Department, CatalogError> {
        self.departments
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<Department>, CatalogError> {
        Ok(self.departments.values().cloned().collect())
    }
}
