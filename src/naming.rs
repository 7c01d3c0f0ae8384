//! Resource naming.
//!
//! Names are built from the project name `P` and the stack identifier `D`:
//!
//! | Resource            | Name       |
//! |---------------------|------------|
//! | resource group      | `P-D-rg`   |
//! | storage account     | `PDst`     |
//! | static website      | `P-D-sbs`  |
//! | app service plan    | `P-D-plan` |
//! | function app        | `P-D-func` |
//!
//! The packaging component appends a random integer to the names it creates.

use crate::engine::Deployment;

/// Deterministic names for one project and stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingStrategy {
    project: String,
    stack: String,
}

impl NamingStrategy {
    /// Names for a project and stack.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
        }
    }

    /// Names for a deployment's project and stack.
    pub fn for_deployment(deployment: &Deployment) -> Self {
        Self::new(deployment.project(), deployment.stack())
    }

    /// Project name
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Stack identifier
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// `P-D-rg`
    pub fn resource_group(&self) -> String {
        format!("{}-{}-rg", self.project, self.stack)
    }

    /// `PDst`
    pub fn storage_account(&self) -> String {
        format!("{}{}st", self.project, self.stack)
    }

    /// `P-D-sbs`
    pub fn static_website(&self) -> String {
        format!("{}-{}-sbs", self.project, self.stack)
    }

    /// `P-D-plan`
    pub fn app_service_plan(&self) -> String {
        format!("{}-{}-plan", self.project, self.stack)
    }

    /// `P-D-func`
    pub fn function_app(&self) -> String {
        format!("{}-{}-func", self.project, self.stack)
    }

    /// `PDstN`
    pub fn suffixed_storage_account(&self, suffix: u32) -> String {
        format!("{}{}", self.storage_account(), suffix)
    }

    /// `P-D-planN`
    pub fn suffixed_app_service_plan(&self, suffix: u32) -> String {
        format!("{}{}", self.app_service_plan(), suffix)
    }
}

/// `zipsN`
pub fn package_container(suffix: u32) -> String {
    format!("zips{}", suffix)
}

/// `funczipN`
pub fn package_blob(suffix: u32) -> String {
    format!("funczip{}", suffix)
}
