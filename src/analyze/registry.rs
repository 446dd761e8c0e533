use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::analyzer::{AnalysisCapability, AnalysisRequest, CueAnalyzer, CueStream};

/// Registry of analyzers by name.
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn CueAnalyzer>>,
    default_name: Option<String>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            analyzers: HashMap::new(),
            default_name: None,
        }
    }

    /// Register an analyzer. The first registered analyzer becomes the default.
    pub fn register<A: CueAnalyzer + 'static>(&mut self, analyzer: A) {
        let name = analyzer.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.analyzers.insert(name, Arc::new(analyzer));
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.analyzers.contains_key(name) {
            return Err(anyhow!("analyzer '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CueAnalyzer>> {
        self.analyzers.get(name).cloned()
    }

    pub fn default_analyzer(&self) -> Option<Arc<dyn CueAnalyzer>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.analyzers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Analyzer for `capability`, preferring the default one.
    pub fn analyzer_for(&self, capability: AnalysisCapability) -> Result<Arc<dyn CueAnalyzer>> {
        if let Some(default_analyzer) = self.default_analyzer() {
            if default_analyzer.supports(capability) {
                return Ok(default_analyzer);
            }
        }

        let mut names: Vec<&String> = self.analyzers.keys().collect();
        names.sort();
        for name in names {
            let analyzer = &self.analyzers[name];
            if analyzer.supports(capability) {
                return Ok(Arc::clone(analyzer));
            }
        }

        Err(anyhow!(
            "no registered analyzer supports capability {:?}",
            capability
        ))
    }

    /// Route a request to an analyzer that can serve its capture mode.
    pub fn route(&self, request: AnalysisRequest) -> Result<CueStream> {
        let analyzer = self.analyzer_for(AnalysisCapability::for_mode(request.mode))?;
        log::debug!(
            "routing {} request to analyzer {}",
            request.mode,
            analyzer.name()
        );
        analyzer.analyze(request)
    }
}

/// A registry is itself an analyzer that dispatches by capture mode, so a
/// session can mix a navigation model with a dedicated text reader.
impl CueAnalyzer for AnalyzerRegistry {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn supports(&self, capability: AnalysisCapability) -> bool {
        self.analyzers
            .values()
            .any(|analyzer| analyzer.supports(capability))
    }

    fn analyze(&self, request: AnalysisRequest) -> Result<CueStream> {
        self.route(request)
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
