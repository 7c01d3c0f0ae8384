//! Reusable groups of resources.

pub mod function_app;

pub use function_app::{PackageFunctionApp, PackageFunctionAppArgs, PACKAGE_APP_SETTINGS};
