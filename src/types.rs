// Strong typing over strings. Newtypes for media time, layer/point/product ids,
// and pixel-space geometry shared by the gating and decoration controllers.

use serde::{Deserialize, Serialize};

/// Playback position in microseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct MediaTime(u64);

impl MediaTime {
    pub fn from_micros(us: u64) -> Self {
        MediaTime(us)
    }

    /// Convert author-time seconds into a `MediaTime`. Rejects NaN, infinite,
    /// and negative values so invalid configuration is filtered at load.
    pub fn from_secs(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        Some(MediaTime((secs * 1_000_000.0).round() as u64))
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(
    /// Player instance id. One engine instance exists per player instance.
    InstanceId
);
id_newtype!(
    /// Overlay layer id, unique within a player instance.
    LayerId
);
id_newtype!(
    /// Hotspot point id, unique within its layer.
    PointId
);
id_newtype!(
    /// External product reference consumed by commerce hotspots.
    ProductId
);

/// Deterministic DOM container id for a layer. The host pre-creates these
/// containers; the engine only addresses them.
pub fn container_id(instance: &InstanceId, layer: &LayerId) -> String {
    format!("layer-{}-{}", instance, layer)
}

/// Overlay kind. Gating kinds block playback; the rest decorate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    #[serde(rename = "gate-form")]
    GateForm,
    #[serde(rename = "gate-cta")]
    GateCta,
    #[serde(rename = "gate-poll")]
    GatePoll,
    #[serde(rename = "hotspot")]
    Hotspot,
    #[serde(rename = "commerce-hotspot")]
    CommerceHotspot,
}

impl OverlayKind {
    pub fn is_gating(&self) -> bool {
        matches!(
            self,
            OverlayKind::GateForm | OverlayKind::GateCta | OverlayKind::GatePoll
        )
    }

    pub fn is_commerce(&self) -> bool {
        matches!(self, OverlayKind::CommerceHotspot)
    }
}

/// Logged user action against an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Optimistic default seeded on activation.
    Skipped,
    Clicked,
    Submitted,
    Hovered,
}

/// Coordinate basis for authored hotspot positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CoordBasis {
    /// Percentage of the rendered content rect (0-100).
    #[default]
    #[serde(rename = "percent")]
    Percent,
    /// Pixels on the historical 800x600 authoring canvas.
    #[serde(rename = "legacy-canvas")]
    LegacyCanvas,
}

/// Engine configuration passed from JS at setup. Built once per session,
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub instance_id: InstanceId,
    #[serde(default)]
    pub overlays: Vec<OverlayConfig>,
    /// Layer containers the host could not find in the DOM. Silently excluded.
    #[serde(default)]
    pub missing_layers: Vec<LayerId>,
    /// Capability flag: gating disabled means gating overlays never activate.
    #[serde(default = "default_true")]
    pub gating_enabled: bool,
    #[serde(default)]
    pub box_width: f64,
    #[serde(default)]
    pub box_height: f64,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: f64,
}

fn default_true() -> bool {
    true
}

fn default_resize_debounce_ms() -> f64 {
    150.0
}

fn default_skip_label() -> String {
    "Skip".to_string()
}

fn default_continue_label() -> String {
    "Continue".to_string()
}

/// One overlay definition as authored. `source_index` is assigned at load and
/// breaks display-time ties so identical times activate in authored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub id: LayerId,
    #[serde(default)]
    pub name: String,
    pub kind: OverlayKind,
    /// Seconds into playback at which the overlay becomes eligible.
    pub display_time: f64,
    /// Decoration window end in seconds. `None` means until the video ends.
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default = "default_true")]
    pub allow_skip: bool,
    #[serde(default = "default_skip_label")]
    pub skip_label: String,
    #[serde(default = "default_continue_label")]
    pub continue_label: String,
    /// Completion signatures: DOM marker strings whose appearance inside the
    /// layer subtree counts as third-party form/poll success. Configuration
    /// data, so new integrations are additive.
    #[serde(default)]
    pub completion_signatures: Vec<String>,
    /// Opt-in: pause playback while the pointer is over this layer.
    #[serde(default)]
    pub hover_pause: bool,
    #[serde(default)]
    pub style: serde_json::Value,
    #[serde(default)]
    pub points: Vec<PointConfig>,
    #[serde(skip, default)]
    pub source_index: usize,
}

/// One hotspot point within a decoration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    pub id: PointId,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_diameter")]
    pub diameter: f64,
    #[serde(default)]
    pub basis: CoordBasis,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub style: serde_json::Value,
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

fn default_diameter() -> f64 {
    5.0
}

/// Native pixel dimensions of the video, from player metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: f64,
    pub height: f64,
}

impl VideoSize {
    pub fn new(width: f64, height: f64) -> Option<Self> {
        if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() {
            Some(VideoSize { width, height })
        } else {
            None
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// The sub-rectangle of the player box actually occupied by video pixels,
/// after letterbox/pillarbox correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A point mapped to pixel space, ready for the host to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPoint {
    pub point_id: PointId,
    pub x: f64,
    pub y: f64,
    pub diameter: f64,
    #[serde(default)]
    pub link: Option<String>,
}

/// A rendered box in pixel space (tooltip anchors).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Resolved product detail from the external lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Outcome of a cart mutation, reported back by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CartOutcome {
    Ok,
    PartialStock,
    OutOfStock,
    Error,
}

/// Toast classification shown after a cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastKind {
    Success,
    PartialStock,
    OutOfStock,
    Error,
}

/// One logged interaction. `upgraded` guards the single allowed in-place
/// action upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub layer_id: LayerId,
    pub layer_type: OverlayKind,
    pub action_type: ActionType,
    /// Playback position (seconds) at which the record was seeded.
    pub timestamp: f64,
    pub layer_name: String,
    #[serde(default)]
    pub upgraded: bool,
}

/// Block state transition published by the gating controller and consumed by
/// the decoration controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTransition {
    Blocked,
    Unblocked,
}
