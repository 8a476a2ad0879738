use sift_config::{Analyzer, Entities};
use sift_domain::{
	QueryComplexity, RefinementRejection, analyze, entities::contains_token, extract_key_entities,
	validate_refinement,
};

const FLOOR: f32 = 0.2;

#[test]
fn stabilium_typo_is_repaired_not_kept() {
	let report = validate_refinement("What is Stabilium?", "Explain Stabilim", &Entities::default());

	assert!(report.accepted());
	assert!(report.refined.entities_preserved);
	assert!(report.refined.text.contains("Stabilium"), "text = {}", report.refined.text);
	assert!(
		!report.refined.text.split_whitespace().any(|word| word == "Stabilim"),
		"text = {}",
		report.refined.text
	);
	assert_eq!(report.repairs.len(), 1);
	assert_eq!(report.repairs[0].replaced, "Stabilim");
}

#[test]
fn every_key_entity_survives_corrupting_rewrites() {
	let cfg = Entities::default();
	let cases = [
		("Who founded Anthropic?", "founder of Antropic"),
		("Stabilium vs Qdrant", "stabilium versus qdrant"),
		("Explain Kubernetes", ""),
		("Explain Kubernetes", "Explain K8s orchestration"),
		("What is Stabilium", "Stabil overview"),
		("How does Rust borrow checking work?", "ownership rules in Rustlang"),
		("Describe Stabilium and Qdrant", "please"),
		("Compare Java and Kotlin", "JavaScript versus Kotlin"),
	];

	for (original, rewritten) in cases {
		let report = validate_refinement(original, rewritten, &cfg);

		for entity in extract_key_entities(original, 3) {
			assert!(
				contains_token(&report.refined.text, &entity),
				"{entity:?} missing from {:?} (rewrite {rewritten:?})",
				report.refined.text
			);
		}
	}
}

#[test]
fn case_only_corruption_is_restored() {
	let report =
		validate_refinement("Stabilium vs Qdrant", "stabilium versus qdrant", &Entities::default());

	assert!(report.accepted());
	assert_eq!(report.refined.text, "Stabilium versus Qdrant");
}

#[test]
fn absent_entities_are_appended() {
	let report = validate_refinement(
		"Explain Kubernetes",
		"Explain K8s orchestration",
		&Entities::default(),
	);

	assert!(report.accepted());
	assert_eq!(report.appended, vec!["Kubernetes".to_string()]);
	assert_eq!(report.refined.text, "Explain K8s orchestration Kubernetes");
}

#[test]
fn half_similar_token_blocks_append_and_rejects() {
	let report = validate_refinement("What is Stabilium", "Stabil overview", &Entities::default());

	assert_eq!(
		report.rejection,
		Some(RefinementRejection::EntityCorruption { missing: vec!["Stabilium".to_string()] })
	);
	assert!(!report.refined.entities_preserved);
	assert_eq!(report.refined.text, "What is Stabilium");
}

#[test]
fn stopword_only_rewrite_falls_back_to_original() {
	for rewritten in ["", "   ", "please", "what is the"] {
		let report = validate_refinement("how do refunds work", rewritten, &Entities::default());

		assert_eq!(report.rejection, Some(RefinementRejection::Empty), "rewrite {rewritten:?}");
		assert_eq!(report.refined.text, "how do refunds work");
	}
}

#[test]
fn empty_rewrite_is_rebuilt_from_key_entities() {
	let report = validate_refinement("Describe Stabilium", "", &Entities::default());

	assert!(report.accepted());
	assert_eq!(report.appended, vec!["Describe".to_string(), "Stabilium".to_string()]);
	assert_eq!(report.refined.text, "Describe Stabilium");
}

#[test]
fn entity_swallowed_by_a_longer_word_is_appended() {
	let report =
		validate_refinement("Compare Java and Kotlin", "JavaScript versus Kotlin", &Entities::default());

	assert!(report.accepted());
	assert!(report.appended.contains(&"Java".to_string()), "appended = {:?}", report.appended);
	assert!(
		report.refined.text.split_whitespace().any(|word| word == "Java"),
		"text = {}",
		report.refined.text
	);
	assert_eq!(report.refined.text, "JavaScript versus Kotlin Compare Java");
}

#[test]
fn query_without_entities_accepts_plain_rewrite() {
	let report =
		validate_refinement("how do refunds work", "refund policy steps", &Entities::default());

	assert!(report.accepted());
	assert!(report.key_entities.is_empty());
	assert_eq!(report.refined.text, "refund policy steps");
}

#[test]
fn short_entity_query_is_simple_with_defaults() {
	let analysis = analyze("What is Stabilium?", &Analyzer::default(), FLOOR);

	assert_eq!(analysis.complexity, QueryComplexity::Simple);
	assert_eq!(analysis.top_k, 15);
	assert!((analysis.relevance_threshold - 0.7).abs() < 1e-6);
	assert_eq!(analysis.capitalized_count, 1);
	assert!(!analysis.ambiguous);
}

#[test]
fn multi_clause_query_is_complex() {
	let analysis = analyze(
		"Compare the Qdrant and Milvus indexing strategies, and explain how Weaviate differs",
		&Analyzer::default(),
		FLOOR,
	);

	assert_eq!(analysis.complexity, QueryComplexity::Complex);
	assert_eq!(analysis.top_k, 20);
	assert!((analysis.relevance_threshold - 0.6).abs() < 1e-6);
}

#[test]
fn bare_keyword_query_is_ambiguous() {
	let analysis = analyze("pricing", &Analyzer::default(), FLOOR);

	assert!(analysis.ambiguous);
	assert_eq!(analysis.complexity, QueryComplexity::Simple);
	assert!((analysis.relevance_threshold - 0.65).abs() < 1e-6);
}

#[test]
fn mid_length_query_is_moderate() {
	let analysis =
		analyze("how should refunds be issued for annual plans today", &Analyzer::default(), FLOOR);

	assert_eq!(analysis.complexity, QueryComplexity::Moderate);
	assert_eq!(analysis.top_k, 15);
}

#[test]
fn threshold_never_drops_below_floor() {
	let cfg = Analyzer { default_threshold: 0.25, ..Analyzer::default() };
	let analysis = analyze("Qdrant, Milvus; Weaviate", &cfg, FLOOR);

	assert_eq!(analysis.complexity, QueryComplexity::Complex);
	assert!((analysis.relevance_threshold - FLOOR).abs() < 1e-6);
}

#[test]
fn analysis_is_deterministic() {
	let query = "Why did the Helios rollout fail, and what did Ops change afterwards?";
	let first = analyze(query, &Analyzer::default(), FLOOR);
	let second = analyze(query, &Analyzer::default(), FLOOR);

	assert_eq!(first, second);
	assert_eq!(
		serde_json::to_string(&first).expect("Analysis must serialize."),
		serde_json::to_string(&second).expect("Analysis must serialize.")
	);
}
