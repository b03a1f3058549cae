use crate::monitor::NamespaceSelector;

/// The namespaces a monitor discovers targets in.
///
/// An empty list means every namespace. Without a selector, or with a
/// selector that names nothing, only the monitor's own namespace is used.
pub fn resolve(selector: Option<&NamespaceSelector>, own_namespace: &str) -> Vec<String> {
    match selector {
        Some(selector) if selector.any => Vec::new(),
        Some(selector) if !selector.match_names.is_empty() => selector.match_names.clone(),
        _ => vec![own_namespace.to_string()],
    }
}
