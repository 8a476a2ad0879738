pub mod analyzer;
pub mod entities;
pub mod similarity;
pub mod text;

pub use analyzer::{QueryAnalysis, QueryComplexity, analyze};
pub use entities::{
	EntityRepair, RefinedQuery, RefinementRejection, RefinementReport, RepairOutcome,
	extract_key_entities, repair_entities, validate_refinement,
};
