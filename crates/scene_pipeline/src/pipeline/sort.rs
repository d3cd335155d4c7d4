//! Sort stage: ordering policies over the culled item list
//!
//! Transparent geometry must draw back-to-front for blending to compose
//! correctly; opaque geometry can additionally be grouped by material to
//! cut state changes and drawn front-to-back for early-z. Variants form a
//! closed set chosen at pipeline construction.

use serde::{Deserialize, Serialize};

use crate::pipeline::item::RenderItem;

/// Item ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStage {
    /// Pass items through in cull order
    None,
    /// Opaque items first (cull order kept), transparent back-to-front
    TransparencyDepth,
    /// Opaque grouped by material and front-to-back, transparent back-to-front
    #[default]
    StateAndTransparencyDepth,
}

impl SortStage {
    /// Reorder `items` in place according to the policy
    pub fn sort(&self, items: &mut [RenderItem]) {
        match self {
            Self::None => {}
            Self::TransparencyDepth => {
                // Stable: opaque items keep their cull order.
                items.sort_by_key(|i| i.transparent);
                let split = items.partition_point(|i| !i.transparent);
                items[split..].sort_by(|a, b| b.depth.total_cmp(&a.depth));
            }
            Self::StateAndTransparencyDepth => {
                items.sort_by_key(|i| i.transparent);
                let split = items.partition_point(|i| !i.transparent);
                items[..split]
                    .sort_by(|a, b| a.material.cmp(&b.material).then(a.depth.total_cmp(&b.depth)));
                items[split..].sort_by(|a, b| b.depth.total_cmp(&a.depth));
            }
        }
    }
}
