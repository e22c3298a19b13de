use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single instance of an instance feature: an ordered attribute bag.
///
/// Attribute order is preserved (an `IndexMap`, not a `HashMap`) because
/// instance evidence carries the full bag through to downstream templating
/// in the order discovery produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFeature {
    pub attributes: IndexMap<String, String>,
}

impl InstanceFeature {
    pub fn new(attributes: IndexMap<String, String>) -> Self {
        Self { attributes }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for InstanceFeature {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            attributes: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// The shape of a feature, as selected by the registry for a given FQN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureShape {
    Flag,
    Attribute,
    Instance,
}

/// An immutable bundle of discovered features, keyed by fully-qualified name
/// (`"domain.feature"`), partitioned by shape.
///
/// The three maps are expected to be disjoint: a well-formed discovery
/// pipeline never publishes the same FQN under two shapes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Features {
    pub flags: HashMap<String, HashSet<String>>,
    pub attributes: HashMap<String, HashMap<String, String>>,
    pub instances: HashMap<String, Vec<InstanceFeature>>,
}

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, fqn: impl Into<String>, keys: HashSet<String>) -> Self {
        self.flags.insert(fqn.into(), keys);
        self
    }

    pub fn with_attribute(
        mut self,
        fqn: impl Into<String>,
        attrs: HashMap<String, String>,
    ) -> Self {
        self.attributes.insert(fqn.into(), attrs);
        self
    }

    pub fn with_instances(
        mut self,
        fqn: impl Into<String>,
        instances: Vec<InstanceFeature>,
    ) -> Self {
        self.instances.insert(fqn.into(), instances);
        self
    }

    /// Returns the shape of `fqn` within this snapshot, if known.
    pub fn shape_of(&self, fqn: &str) -> Option<FeatureShape> {
        if self.flags.contains_key(fqn) {
            Some(FeatureShape::Flag)
        } else if self.attributes.contains_key(fqn) {
            Some(FeatureShape::Attribute)
        } else if self.instances.contains_key(fqn) {
            Some(FeatureShape::Instance)
        } else {
            None
        }
    }
}
