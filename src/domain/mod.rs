pub mod analysis;
pub mod fingerprint;
pub mod record;
pub mod types;

pub use analysis::{AnalysisResult, RiskLevel};
pub use fingerprint::{fingerprint, Fingerprint};
pub use record::{ContentRecord, ExtractionError, Source};
pub use types::SurfaceId;
