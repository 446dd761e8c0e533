mod analyzer;
mod registry;
mod stub;

pub use analyzer::{AnalysisCapability, AnalysisRequest, CueAnalyzer, CueStream};
pub use registry::AnalyzerRegistry;
pub use stub::StubAnalyzer;
