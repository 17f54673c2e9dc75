// Configuration validation and sequence building. Invalid definitions are
// filtered at load, never raised: a bad overlay must not take the player down.

use tracing::warn;

use crate::error::OverlayError;
use crate::types::{EngineConfig, LayerId, MediaTime, OverlayConfig};

/// Validated, partitioned overlay configuration.
#[derive(Debug)]
pub struct PreparedConfig {
    /// Gating overlays sorted by display time, stable on source order.
    pub gating: Vec<OverlayConfig>,
    /// Plain hotspot layers, source order.
    pub decoration: Vec<OverlayConfig>,
    /// Commerce hotspot layers, source order.
    pub commerce: Vec<OverlayConfig>,
}

/// Validate the engine configuration and partition overlays by controller.
///
/// Filtering rules:
/// - non-finite or negative `display_time`: dropped
/// - `end_time` present but not after `display_time`: dropped
/// - duplicate layer id: first occurrence wins
/// - layer listed in `missing_layers` (container absent from the DOM): dropped
///
/// Two gating overlays may share a `display_time`; they activate in authored
/// order via the stable sort.
pub fn prepare(config: &EngineConfig) -> Result<PreparedConfig, OverlayError> {
    if config.instance_id.as_str().is_empty() {
        return Err(OverlayError::InvalidConfig(
            "instance_id must not be empty".to_string(),
        ));
    }

    let mut seen: Vec<&LayerId> = Vec::new();
    let mut gating = Vec::new();
    let mut decoration = Vec::new();
    let mut commerce = Vec::new();

    for (index, overlay) in config.overlays.iter().enumerate() {
        if MediaTime::from_secs(overlay.display_time).is_none() {
            warn!(layer = %overlay.id, display_time = overlay.display_time,
                "overlay dropped: invalid display_time");
            continue;
        }
        if let Some(end) = overlay.end_time {
            if !end.is_finite() || end <= overlay.display_time {
                warn!(layer = %overlay.id, end_time = end,
                    "overlay dropped: end_time not after display_time");
                continue;
            }
        }
        if seen.contains(&&overlay.id) {
            warn!(layer = %overlay.id, "overlay dropped: duplicate id");
            continue;
        }
        if config.missing_layers.contains(&overlay.id) {
            // Silent exclusion, never a thrown error.
            warn!(layer = %overlay.id, "overlay dropped: container missing from DOM");
            continue;
        }
        seen.push(&overlay.id);

        let mut overlay = overlay.clone();
        overlay.source_index = index;
        if overlay.kind.is_gating() {
            gating.push(overlay);
        } else if overlay.kind.is_commerce() {
            commerce.push(overlay);
        } else {
            decoration.push(overlay);
        }
    }

    // Stable sort keeps authored order for identical display times.
    gating.sort_by(|a, b| {
        a.display_time
            .partial_cmp(&b.display_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(PreparedConfig {
        gating,
        decoration,
        commerce,
    })
}
