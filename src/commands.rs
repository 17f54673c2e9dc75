// Output side of the JS boundary. Every engine entry point returns a batch of
// commands that the host shim applies verbatim to the DOM and the player API.
// The engine never touches the DOM itself.

use serde::{Deserialize, Serialize};

use crate::types::{LayerId, PointId, ProductDetail, ProductId, RenderedPoint, ToastKind};

/// One instruction for the host shim. Layer-level commands address the
/// pre-existing container at `layer-<instanceId>-<layerId>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OverlayCommand {
    /// Reveal a gating overlay container.
    ShowLayer { layer_id: LayerId },
    /// Hide a gating overlay container.
    HideLayer { layer_id: LayerId },
    PausePlayback,
    ResumePlayback,
    /// Enable or disable the native player controls.
    SetControlsEnabled { enabled: bool },
    /// Generic skip/continue control descriptor: one factory on the host side
    /// renders it, no per-kind button widgets.
    SetSkipControl {
        layer_id: LayerId,
        label: String,
        visible: bool,
    },
    /// Start a DOM-mutation watch on the layer subtree for these success
    /// signatures.
    WatchCompletion {
        layer_id: LayerId,
        signatures: Vec<String>,
    },
    /// Disconnect the mutation watch (one-shot after a match, and at teardown).
    StopWatching { layer_id: LayerId },
    /// Toggle a marker class on the layer container ("hidden", "overlapped",
    /// "fullscreen").
    AddClass { layer_id: LayerId, class: String },
    RemoveClass { layer_id: LayerId, class: String },
    /// Construct the point DOM for a decoration layer. Emitted at most once
    /// per layer per session.
    BuildPoints {
        layer_id: LayerId,
        points: Vec<RenderedPoint>,
    },
    /// Move existing point DOM to freshly computed pixel positions.
    RepositionPoints {
        layer_id: LayerId,
        points: Vec<RenderedPoint>,
    },
    /// Move the layer subtree into (or out of) the fullscreen container.
    Reparent { layer_id: LayerId, fullscreen: bool },
    /// Ask the host to look up one product. Deduplicated per layer.
    FetchProduct { product_id: ProductId },
    /// Fill a point's info box with resolved product detail.
    RenderProduct {
        layer_id: LayerId,
        point_id: PointId,
        detail: ProductDetail,
    },
    /// Mark a point whose product lookup failed. Siblings are unaffected.
    RenderProductMissing { layer_id: LayerId, point_id: PointId },
    /// Enable or disable a point's cart action control.
    SetActionEnabled {
        layer_id: LayerId,
        point_id: PointId,
        enabled: bool,
    },
    /// Perform the cart mutation for a point's product.
    SubmitCart {
        layer_id: LayerId,
        point_id: PointId,
        product_id: ProductId,
    },
    /// Transient user message after a cart mutation.
    ShowToast { kind: ToastKind, message: String },
}

/// Serialize a command batch for the boundary.
pub fn to_json(commands: &[OverlayCommand]) -> Result<String, crate::error::OverlayError> {
    Ok(serde_json::to_string(commands)?)
}
