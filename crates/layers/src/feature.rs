use std::collections::BTreeMap;

use foundation::{Geometry, ObjectId};

/// Attribute table of a feature, keyed by field name.
pub type Attributes = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Assigned by the store on insert; `None` for features not yet stored.
    pub object_id: Option<ObjectId>,
    pub geometry: Geometry,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry>) -> Self {
        Self {
            object_id: None,
            geometry: geometry.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}
