use std::collections::HashMap;

/// Known embedding models and their output dimension.
pub const KNOWN_MODELS: &[(&str, usize)] = &[
    ("text-embedding-3-large", 3072),
    ("text-embedding-3-small", 1536),
    ("text-embedding-ada-002", 1536),
];

/// Maps model names to the dimension of the vectors they produce.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    dimensions: HashMap<String, usize>,
}

impl ModelCatalog {
    /// Catalog with no models registered.
    pub fn empty() -> Self {
        Self { dimensions: HashMap::new() }
    }

    /// Register (or replace) a model.
    pub fn with_model(mut self, name: impl Into<String>, dimension: usize) -> Self {
        self.register(name, dimension);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, dimension: usize) {
        self.dimensions.insert(name.into(), dimension);
    }

    pub fn dimension(&self, model: &str) -> Option<usize> {
        self.dimensions.get(model).copied()
    }

    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dimensions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        for (name, dim) in KNOWN_MODELS {
            catalog.register(*name, *dim);
        }
        catalog
    }
}
