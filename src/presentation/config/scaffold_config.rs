/// Scaffold mode runs the full pipeline against the mock engine, so the
/// service can be exercised without downloading a model.
#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    pub enabled: bool,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            enabled: std::env::var("SCAFFOLD_MODE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}
