//! Value renderers keyed by exact type name
//!
//! [`Oop::render_value`](crate::Oop::render_value) looks the object's type up
//! here first and falls back to the structural rendering. Only the built-in
//! text type is registered by default.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::HeapResult;
use crate::oops::Oop;
use crate::strings;

/// Qualified name of the runtime's built-in text type
pub const STRING_TYPE: &str = "java/lang/String";

/// Renderer signature
pub type RenderFn = fn(&Oop<'_>) -> HeapResult<String>;

/// Map from exact type name to renderer
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: FxHashMap<String, RenderFn>,
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.renderers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("RendererRegistry")
            .field("types", &names)
            .finish()
    }
}

impl RendererRegistry {
    /// Create an empty registry; every type renders structurally
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in string renderer
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(STRING_TYPE, render_string);
        registry
    }

    /// Register `render` for `type_name`, returning the renderer it replaces
    pub fn register(&mut self, type_name: impl Into<String>, render: RenderFn) -> Option<RenderFn> {
        self.renderers.insert(type_name.into(), render)
    }

    /// Remove the renderer for `type_name`
    pub fn unregister(&mut self, type_name: &str) -> Option<RenderFn> {
        self.renderers.remove(type_name)
    }

    /// Renderer for exactly `type_name`
    pub fn get(&self, type_name: &str) -> Option<RenderFn> {
        self.renderers.get(type_name).copied()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.renderers.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

/// Render a string object as its quoted contents
pub fn render_string(oop: &Oop<'_>) -> HeapResult<String> {
    Ok(format!("\"{}\"", strings::decode_string(oop)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder(_oop: &Oop<'_>) -> HeapResult<String> {
        Ok("<placeholder>".to_string())
    }

    #[test]
    fn test_builtins() {
        let registry = RendererRegistry::with_builtins();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(STRING_TYPE));
        assert!(registry.get("java/lang/StringBuilder").is_none());
        assert!(registry.get("java/lang/string").is_none());
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = RendererRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.register("java/lang/Integer", placeholder).is_none());
        assert!(registry.register("java/lang/Integer", placeholder).is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("java/lang/Integer").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_debug_lists_types() {
        let registry = RendererRegistry::with_builtins();
        assert_eq!(
            format!("{:?}", registry),
            "RendererRegistry { types: [\"java/lang/String\"] }"
        );
    }
}
