// Append-only interaction log with idempotent upgrade semantics.
// Every overlay activation seeds an optimistic "skipped" record; at most one
// in-place action upgrade is allowed per record, first write wins.

use tracing::debug;

use crate::types::{ActionType, InstanceId, InteractionRecord, LayerId, OverlayKind};

/// Per-player-instance interaction record store. Persisted by the host under
/// a namespaced local key as `{ [instanceId]: InteractionRecord[] }`; server
/// synchronization is the host's concern.
#[derive(Debug)]
pub struct InteractionLog {
    instance_id: InstanceId,
    entries: Vec<InteractionRecord>,
}

impl InteractionLog {
    pub fn new(instance_id: InstanceId) -> Self {
        InteractionLog {
            instance_id,
            entries: Vec::new(),
        }
    }

    /// Append one record.
    pub fn record(&mut self, record: InteractionRecord) {
        debug!(layer = %record.layer_id, action = ?record.action_type, "interaction recorded");
        self.entries.push(record);
    }

    /// Seed the optimistic default entry for an activated overlay. No-op if
    /// the layer already has a record, so repeated activations never
    /// duplicate.
    pub fn seed(&mut self, layer_id: &LayerId, layer_type: OverlayKind, name: &str, at_secs: f64) {
        if self.has_layer(layer_id) {
            return;
        }
        self.record(InteractionRecord {
            layer_id: layer_id.clone(),
            layer_type,
            action_type: ActionType::Skipped,
            timestamp: at_secs,
            layer_name: name.to_string(),
            upgraded: false,
        });
    }

    /// Upgrade the first record matching `layer_id` in place. Never inserts;
    /// a record accepts exactly one upgrade (first write wins). Returns
    /// whether the upgrade was applied.
    pub fn upgrade(&mut self, layer_id: &LayerId, action: ActionType) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.layer_id == *layer_id)
        {
            Some(entry) if !entry.upgraded => {
                entry.action_type = action;
                entry.upgraded = true;
                debug!(layer = %layer_id, action = ?action, "interaction upgraded");
                true
            }
            _ => false,
        }
    }

    pub fn has_layer(&self, layer_id: &LayerId) -> bool {
        self.entries.iter().any(|e| e.layer_id == *layer_id)
    }

    pub fn entries(&self) -> &[InteractionRecord] {
        &self.entries
    }

    /// Export as `{ instanceId: [records] }` for the host's storage key.
    pub fn to_json(&self) -> Result<String, crate::error::OverlayError> {
        let map = serde_json::json!({ self.instance_id.as_str(): self.entries });
        Ok(serde_json::to_string(&map)?)
    }
}
