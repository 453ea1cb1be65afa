//! Property tree: chain → properties, bounded to 5 levels deep. Removal is
//! soft (status flips to `sold`) and refuses a property with children.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::config::InheritanceMode;

pub const MAX_DEPTH: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    Active,
    Sold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub chain_id: String,
    pub parent_id: Option<String>,
    pub property_type: String,
    pub level: u8,
    pub status: PropertyStatus,
    pub inheritance_mode: InheritanceMode,
    pub local_config: serde_json::Value,
    pub local_overrides: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chain {
    pub id: String,
    pub policies: serde_json::Value,
}

/// Holds the chain's property tree. Cheap to share behind an `Arc`: the
/// only mutation path is `add_property`/`remove_property`, both of which
/// bump `version` so cached effective-config resolutions elsewhere can be
/// invalidated without walking the whole tree.
pub struct HierarchyEngine {
    chain: Chain,
    properties: DashMap<String, Property>,
    version: AtomicU64,
}

impl HierarchyEngine {
    pub fn new(chain: Chain) -> Self {
        Self { chain, properties: DashMap::new(), version: AtomicU64::new(0) }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Bumped on every structural or config change; pair with a cached
    /// resolution to know when to recompute.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn get(&self, property_id: &str) -> Option<Property> {
        self.properties.get(property_id).map(|p| p.clone())
    }

    pub fn children_of(&self, property_id: &str) -> Vec<Property> {
        self.properties
            .iter()
            .filter(|entry| entry.parent_id.as_deref() == Some(property_id))
            .map(|entry| entry.clone())
            .collect()
    }

    /// Insert a new property under `parent_id` (or at the root, when
    /// `None`). The new property's level is one past its parent's; roots
    /// are level 0. Rejects insertion past [`MAX_DEPTH`].
    pub fn add_property(
        &self,
        id: impl Into<String>,
        parent_id: Option<String>,
        property_type: impl Into<String>,
        inheritance_mode: InheritanceMode,
        local_config: serde_json::Value,
    ) -> Result<Property, Error> {
        let id = id.into();
        if self.properties.contains_key(&id) {
            return Err(Error::Conflict(format!("property {id} already exists")));
        }

        let level = match &parent_id {
            None => 0,
            Some(parent) => {
                let parent = self
                    .properties
                    .get(parent)
                    .ok_or_else(|| Error::NotFound(format!("parent property {parent} not found")))?;
                if parent.level + 1 > MAX_DEPTH {
                    return Err(Error::ValidationError(format!(
                        "property depth would exceed {MAX_DEPTH}"
                    )));
                }
                parent.level + 1
            }
        };

        let property = Property {
            id: id.clone(),
            chain_id: self.chain.id.clone(),
            parent_id,
            property_type: property_type.into(),
            level,
            status: PropertyStatus::Active,
            inheritance_mode,
            local_config,
            local_overrides: serde_json::Value::Null,
        };
        self.properties.insert(id, property.clone());
        self.bump_version();
        Ok(property)
    }

    /// Soft-delete: flips status to `sold`. Refuses if the property has
    /// any (active or sold) children — children must be reparented or
    /// removed first.
    pub fn remove_property(&self, property_id: &str) -> Result<(), Error> {
        if !self.children_of(property_id).is_empty() {
            return Err(Error::Conflict(format!(
                "property {property_id} has children and cannot be removed"
            )));
        }
        let mut entry = self
            .properties
            .get_mut(property_id)
            .ok_or_else(|| Error::NotFound(format!("property {property_id} not found")))?;
        entry.status = PropertyStatus::Sold;
        drop(entry);
        self.bump_version();
        Ok(())
    }

    pub fn set_local_overrides(&self, property_id: &str, overrides: serde_json::Value) -> Result<(), Error> {
        let mut entry = self
            .properties
            .get_mut(property_id)
            .ok_or_else(|| Error::NotFound(format!("property {property_id} not found")))?;
        entry.local_overrides = overrides;
        drop(entry);
        self.bump_version();
        Ok(())
    }

    /// Ancestor chain from `property_id` up to (and not including) the
    /// root's non-existent parent, root first.
    pub fn ancestors(&self, property_id: &str) -> Result<Vec<Property>, Error> {
        let mut chain = Vec::new();
        let mut current = self
            .properties
            .get(property_id)
            .map(|p| p.clone())
            .ok_or_else(|| Error::NotFound(format!("property {property_id} not found")))?;
        loop {
            match &current.parent_id {
                Some(parent_id) => {
                    let parent = self
                        .properties
                        .get(parent_id)
                        .map(|p| p.clone())
                        .ok_or_else(|| Error::Internal(format!("dangling parent reference {parent_id}")))?;
                    chain.push(current);
                    current = parent;
                }
                None => {
                    chain.push(current);
                    break;
                }
            }
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn properties_by_type(&self, property_type: &str) -> Vec<Property> {
        self.properties
            .iter()
            .filter(|entry| entry.property_type == property_type && entry.status == PropertyStatus::Active)
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn all_active(&self) -> Vec<Property> {
        self.properties
            .iter()
            .filter(|entry| entry.status == PropertyStatus::Active)
            .map(|entry| entry.clone())
            .collect()
    }
}

pub type ConfigMap = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> HierarchyEngine {
        HierarchyEngine::new(Chain { id: "chain-1".into(), policies: serde_json::json!({}) })
    }

    #[test]
    fn root_property_is_level_zero() {
        let engine = engine();
        let hq = engine
            .add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({}))
            .unwrap();
        assert_eq!(hq.level, 0);
    }

    #[test]
    fn child_level_increments() {
        let engine = engine();
        engine.add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({})).unwrap();
        let child = engine
            .add_property("prop-1", Some("hq".into()), "hotel", InheritanceMode::Full, serde_json::json!({}))
            .unwrap();
        assert_eq!(child.level, 1);
    }

    #[test]
    fn rejects_depth_beyond_max() {
        let engine = engine();
        let mut parent: Option<String> = None;
        for i in 0..=MAX_DEPTH {
            let id = format!("p{i}");
            engine
                .add_property(id.clone(), parent.clone(), "hotel", InheritanceMode::None, serde_json::json!({}))
                .unwrap();
            parent = Some(id);
        }
        let result = engine.add_property(
            "too-deep",
            parent,
            "hotel",
            InheritanceMode::None,
            serde_json::json!({}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn removal_refuses_property_with_children() {
        let engine = engine();
        engine.add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({})).unwrap();
        engine
            .add_property("prop-1", Some("hq".into()), "hotel", InheritanceMode::None, serde_json::json!({}))
            .unwrap();
        assert!(engine.remove_property("hq").is_err());
    }

    #[test]
    fn removal_is_soft() {
        let engine = engine();
        engine.add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({})).unwrap();
        engine.remove_property("hq").unwrap();
        assert_eq!(engine.get("hq").unwrap().status, PropertyStatus::Sold);
    }

    #[test]
    fn structural_change_bumps_version() {
        let engine = engine();
        let before = engine.version();
        engine.add_property("hq", None, "hq", InheritanceMode::None, serde_json::json!({})).unwrap();
        assert!(engine.version() > before);
    }
}
