//! Effective configuration resolution: `full`/`selective`/`override`/`none`
//! inheritance against a resolved ancestor chain, with local overrides
//! always applied last. Deterministic and side-effect-free per property;
//! callers may memoize against [`super::hierarchy::HierarchyEngine::version`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

use super::hierarchy::{HierarchyEngine, Property};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InheritanceMode {
    /// Chain/parent config fully shadows local values.
    Full,
    /// Only the named keys are inherited; everything else stays local.
    Selective(Vec<String>),
    /// Inherited config is a base; local values override per key.
    Override,
    /// Fully independent of chain/parent.
    None,
}

fn as_object(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Shallow key-wise merge: `overlay` wins over `base` for any key present
/// in both.
fn merge(base: &Value, overlay: &Value) -> Value {
    let mut merged = as_object(base);
    for (key, value) in as_object(overlay) {
        merged.insert(key, value);
    }
    Value::Object(merged)
}

fn pick_keys(value: &Value, keys: &[String]) -> Value {
    let source = as_object(value);
    let mut picked = Map::new();
    for key in keys {
        if let Some(v) = source.get(key) {
            picked.insert(key.clone(), v.clone());
        }
    }
    Value::Object(picked)
}

/// Resolve property `property_id`'s effective configuration per
/// SPEC_FULL's three-step algorithm: local config, then inheritance
/// against the merged parent/chain config, then explicit overrides.
pub fn resolve_effective_config(engine: &HierarchyEngine, property_id: &str) -> Result<Value, Error> {
    let ancestors = engine.ancestors(property_id)?;
    let target = ancestors
        .last()
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("property {property_id} not found")))?;

    // Fold root-to-target, excluding the target itself: each step's
    // "parent/chain merged config" is the fold's running accumulator.
    let mut merged_ancestor_config = engine.chain().policies.clone();
    for ancestor in &ancestors[..ancestors.len() - 1] {
        merged_ancestor_config = apply_inheritance(ancestor, &merged_ancestor_config);
    }

    let mut effective = apply_inheritance(&target, &merged_ancestor_config);
    if !target.local_overrides.is_null() {
        effective = merge(&effective, &target.local_overrides);
    }
    Ok(effective)
}

fn apply_inheritance(property: &Property, parent_merged: &Value) -> Value {
    match &property.inheritance_mode {
        InheritanceMode::Full => parent_merged.clone(),
        InheritanceMode::Selective(keys) => {
            let inherited = pick_keys(parent_merged, keys);
            merge(&property.local_config, &inherited)
        }
        InheritanceMode::Override => merge(parent_merged, &property.local_config),
        InheritanceMode::None => property.local_config.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::hierarchy::{Chain, HierarchyEngine};

    fn engine_with(chain_policies: Value) -> HierarchyEngine {
        HierarchyEngine::new(Chain { id: "chain-1".into(), policies: chain_policies })
    }

    #[test]
    fn full_inheritance_shadows_local() {
        let engine = engine_with(serde_json::json!({ "max_rate": 500 }));
        engine
            .add_property("hq", None, "hq", InheritanceMode::Full, serde_json::json!({}))
            .unwrap();
        engine
            .add_property(
                "prop-1",
                Some("hq".into()),
                "hotel",
                InheritanceMode::Full,
                serde_json::json!({ "max_rate": 100 }),
            )
            .unwrap();

        let effective = resolve_effective_config(&engine, "prop-1").unwrap();
        assert_eq!(effective["max_rate"], 500);
    }

    #[test]
    fn override_mode_lets_local_win_per_key() {
        let engine = engine_with(serde_json::json!({ "max_rate": 500, "currency": "USD" }));
        engine
            .add_property("hq", None, "hq", InheritanceMode::Full, serde_json::json!({}))
            .unwrap();
        engine
            .add_property(
                "prop-1",
                Some("hq".into()),
                "hotel",
                InheritanceMode::Override,
                serde_json::json!({ "max_rate": 100 }),
            )
            .unwrap();

        let effective = resolve_effective_config(&engine, "prop-1").unwrap();
        assert_eq!(effective["max_rate"], 100);
        assert_eq!(effective["currency"], "USD");
    }

    #[test]
    fn selective_mode_only_inherits_named_keys() {
        let engine = engine_with(serde_json::json!({ "max_rate": 500, "currency": "USD" }));
        engine
            .add_property("hq", None, "hq", InheritanceMode::Full, serde_json::json!({}))
            .unwrap();
        engine
            .add_property(
                "prop-1",
                Some("hq".into()),
                "hotel",
                InheritanceMode::Selective(vec!["currency".to_string()]),
                serde_json::json!({ "max_rate": 100 }),
            )
            .unwrap();

        let effective = resolve_effective_config(&engine, "prop-1").unwrap();
        assert_eq!(effective["max_rate"], 100);
        assert_eq!(effective["currency"], "USD");
    }

    #[test]
    fn none_mode_is_fully_independent() {
        let engine = engine_with(serde_json::json!({ "max_rate": 500 }));
        engine
            .add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({}))
            .unwrap();
        engine
            .add_property(
                "prop-1",
                Some("hq".into()),
                "hotel",
                InheritanceMode::None,
                serde_json::json!({ "max_rate": 100 }),
            )
            .unwrap();

        let effective = resolve_effective_config(&engine, "prop-1").unwrap();
        assert_eq!(effective["max_rate"], 100);
    }

    #[test]
    fn local_overrides_apply_after_inheritance() {
        let engine = engine_with(serde_json::json!({ "max_rate": 500 }));
        engine
            .add_property("hq", None, "hq", InheritanceMode::Full, serde_json::json!({}))
            .unwrap();
        engine
            .add_property(
                "prop-1",
                Some("hq".into()),
                "hotel",
                InheritanceMode::Full,
                serde_json::json!({}),
            )
            .unwrap();
        engine.set_local_overrides("prop-1", serde_json::json!({ "max_rate": 999 })).unwrap();

        let effective = resolve_effective_config(&engine, "prop-1").unwrap();
        assert_eq!(effective["max_rate"], 999);
    }
}
