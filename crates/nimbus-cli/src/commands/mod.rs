pub(crate) mod action;
pub(crate) mod activation;
pub(crate) mod trigger;

use crate::client::{CliError, CliResult};

/// Fully qualified entity reference split into namespace and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntityPath<'a> {
    /// `None` means the context's default namespace.
    pub(crate) namespace: Option<&'a str>,
    /// Entity name, possibly `package/name`.
    pub(crate) name: &'a str,
}

/// Parse `NAME`, `PACKAGE/NAME`, `/NAMESPACE/NAME`, or `/NAMESPACE/PACKAGE/NAME`.
pub(crate) fn parse_entity_path(input: &str) -> CliResult<EntityPath<'_>> {
    let trimmed = input.trim();
    let invalid = || CliError::validation(format!("invalid entity name '{input}'"));

    let path = match trimmed.strip_prefix('/') {
        Some(qualified) => {
            let (namespace, name) = qualified.split_once('/').ok_or_else(invalid)?;
            EntityPath {
                namespace: Some(namespace),
                name,
            }
        }
        None => EntityPath {
            namespace: None,
            name: trimmed,
        },
    };

    let blank_namespace = path.namespace.is_some_and(str::is_empty);
    if blank_namespace || path.name.split('/').any(str::is_empty) {
        return Err(invalid());
    }
    Ok(path)
}
