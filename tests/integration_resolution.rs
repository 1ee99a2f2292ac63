//! End-to-end resolution of spec chains against on-disk directory trees.

use anyhow::Result;
use serde_json::json;

use dirspec::{
    GlobSpec, JsonSpec, Map, PathSpec, PathsSpec, ResolveContext, Retype, SpecChain, SpecError,
    YamlSpec,
};

mod common;

#[test]
fn test_full_chain_resolves_flat_mapping() -> Result<()> {
    let dir = common::session_tree()?;

    let chain = SpecChain::new(PathSpec::new("sub_{subject_id}/{session_date}/trial_01.bin")?)
        .then(JsonSpec::new("sub_m77/session.json", "experimenter", "session.experimenter"))
        .then(YamlSpec::new("sub_m77/notes.yaml", "rig", "rig"))
        .then(GlobSpec::new("session_dir", "sub_{subject_id}/{session_date}")?.directories_only());

    let metadata = chain.parse(dir.path())?;

    assert_eq!(metadata["subject_id"], json!("m77"));
    assert_eq!(metadata["session_date"], json!("2020-01-01"));
    assert_eq!(metadata["experimenter"], json!("jonny"));
    assert_eq!(metadata["rig"], json!("box2"));
    assert!(metadata["session_dir"].as_str().unwrap().ends_with("2020-01-01"));
    assert_eq!(
        chain.specifies(),
        ["subject_id", "session_date", "experimenter", "rig", "session_dir"]
    );
    Ok(())
}

#[test]
fn test_resolution_is_idempotent_cold_and_warm() -> Result<()> {
    let dir = common::session_tree()?;
    let chain = SpecChain::new(PathSpec::new("sub_{subject_id}")?)
        .then(JsonSpec::new("sub_m77/session.json", "experimenter", "session.experimenter"));

    let ctx = ResolveContext::new();
    let cold = chain.parse_with(dir.path(), &Map::new(), &ctx)?;
    assert_eq!(ctx.cache.len(), 1);
    let warm = chain.parse_with(dir.path(), &Map::new(), &ctx)?;
    assert_eq!(cold, warm);

    // a fresh context agrees with the shared one
    let fresh = chain.parse(dir.path())?;
    assert_eq!(cold, fresh);
    Ok(())
}

#[test]
fn test_single_match_mode_flags_divergent_keys() -> Result<()> {
    let dir = common::session_tree()?;
    let chain =
        SpecChain::new(PathSpec::new("sub_{subject_id}/{session_date}/trial_{trial}.bin")?);

    let err = chain.parse(dir.path()).unwrap_err();
    match err {
        SpecError::Ambiguity { message } => {
            assert!(message.contains("trial"));
            assert!(message.contains("paths"), "should suggest the multi-match spec");
        }
        other => panic!("expected Ambiguity, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_multi_match_mode_returns_value_sets() -> Result<()> {
    let dir = common::session_tree()?;
    let chain =
        SpecChain::new(PathsSpec::new("sub_{subject_id}/{session_date}/trial_{trial}.bin")?);

    let metadata = chain.parse(dir.path())?;
    assert_eq!(metadata["subject_id"], json!(["m77"]));
    assert_eq!(metadata["session_date"], json!(["2020-01-01"]));
    assert_eq!(metadata["trial"], json!(["01", "02"]));
    Ok(())
}

#[test]
fn test_retype_coerces_captured_tokens() -> Result<()> {
    let dir = common::session_tree()?;
    let chain = SpecChain::new(
        PathsSpec::new("sub_m77/{session_date}/trial_{trial}.bin")?.with_retype(Retype::String),
    )
    .then(PathsSpec::new("sub_m77/2020-01-01/trial_{trial}.bin")?.with_retype(Retype::Int));

    let metadata = chain.parse(dir.path())?;
    assert_eq!(metadata["trial"], json!([1, 2]));

    // a value that resists coercion aborts resolution
    let chain =
        SpecChain::new(PathSpec::new("sub_{subject_id}")?.with_retype(Retype::Int));
    assert!(matches!(chain.parse(dir.path()).unwrap_err(), SpecError::Retype { .. }));
    Ok(())
}

#[test]
fn test_glob_after_producer_ordering() -> Result<()> {
    let dir = common::session_tree()?;

    // correct order: subject_id resolved before the glob references it
    let chain = SpecChain::new(PathSpec::new("sub_{subject_id}")?)
        .then(GlobSpec::new("session_json", "sub_{subject_id}/*.json")?);
    let metadata = chain.parse(dir.path())?;
    assert!(metadata["session_json"].as_str().unwrap().ends_with("session.json"));

    // wrong order: the glob runs first and must name the missing key
    let chain = SpecChain::new(GlobSpec::new("session_json", "sub_{subject_id}/*.json")?)
        .then(PathSpec::new("sub_{subject_id}")?);
    match chain.parse(dir.path()).unwrap_err() {
        SpecError::MissingDependency { key } => assert_eq!(key, "subject_id"),
        other => panic!("expected MissingDependency, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_failure_returns_no_partial_mapping_and_leaves_seed_alone() -> Result<()> {
    let dir = common::session_tree()?;
    let chain = SpecChain::new(PathSpec::new("sub_{subject_id}")?)
        .then(JsonSpec::new("sub_m77/missing.json", "gone", "nope"));

    let mut seed = Map::new();
    seed.insert("institution".into(), json!("uo"));
    let before = seed.clone();

    let result = chain.parse_with(dir.path(), &seed, &ResolveContext::new());
    assert!(result.is_err(), "missing file must abort resolution");
    assert_eq!(seed, before, "caller's metadata must not be touched on failure");
    Ok(())
}

#[test]
fn test_seed_metadata_feeds_substitution_and_merges_right_biased() -> Result<()> {
    let dir = common::session_tree()?;
    let chain = SpecChain::new(GlobSpec::new("session_json", "sub_{subject_id}/*.json")?)
        .then(PathSpec::new("sub_{subject_id}")?);

    let mut seed = Map::new();
    seed.insert("subject_id".into(), json!("m77"));

    let metadata = chain.parse_with(dir.path(), &seed, &ResolveContext::new())?;
    // the glob consumed the seeded key, and the later path spec re-resolved it
    assert!(metadata["session_json"].as_str().unwrap().ends_with("session.json"));
    assert_eq!(metadata["subject_id"], json!("m77"));
    Ok(())
}

#[test]
fn test_shared_cache_across_chains() -> Result<()> {
    let dir = common::session_tree()?;
    let shared = dirspec::LoadCache::new();

    let first = SpecChain::new(JsonSpec::new(
        "sub_m77/session.json",
        "experimenter",
        "session.experimenter",
    ));
    let second = SpecChain::new(JsonSpec::new(
        "sub_m77/session.json",
        "first_weight",
        "session.weights.0",
    ));

    first.parse_with(dir.path(), &Map::new(), &ResolveContext::with_cache(shared.clone()))?;
    let out =
        second.parse_with(dir.path(), &Map::new(), &ResolveContext::with_cache(shared.clone()))?;

    assert_eq!(out["first_weight"], json!(23.4));
    assert_eq!(shared.len(), 1, "both chains parsed the file through one cache entry");
    Ok(())
}
