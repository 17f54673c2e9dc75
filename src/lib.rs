// overlay_core: time-synchronized interactive video overlay engine.
// All overlay decisions live here; JS is plumbing. The host shim forwards
// player/DOM events in as JSON and applies the returned command batches to
// the DOM and the player API verbatim.

mod commands;
mod commerce;
mod config;
mod decoration;
mod error;
mod gating;
mod geometry;
mod interaction;
mod session;
mod types;

use wasm_bindgen::prelude::*;

pub use commands::OverlayCommand;
pub use commerce::CommerceController;
pub use decoration::DecorationController;
pub use error::OverlayError;
pub use gating::GatingController;
pub use geometry::{
    content_rect, map_point, map_points, place_tooltip, TooltipPlacement, TooltipSide,
    LEGACY_CANVAS_HEIGHT, LEGACY_CANVAS_WIDTH,
};
pub use interaction::InteractionLog;
pub use session::OverlaySession;
pub use types::*;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(commands: &[OverlayCommand]) -> Result<String, JsValue> {
    commands::to_json(commands).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Engine version, for the host shim's compatibility check.
#[wasm_bindgen]
pub fn engine_version() -> String {
    ENGINE_VERSION.to_string()
}

/// Main engine interface exposed to JavaScript. One instance per player
/// instance. Every event entry point returns a JSON array of commands for
/// the host shim to apply.
#[wasm_bindgen]
pub struct OverlayEngine {
    session: OverlaySession,
}

#[wasm_bindgen]
impl OverlayEngine {
    /// Create an engine from the per-player overlay configuration JSON.
    /// Invalid overlay definitions are filtered, never fatal; only an
    /// unparseable or instance-less configuration fails construction.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<OverlayEngine, JsValue> {
        let config: EngineConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        let session =
            OverlaySession::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(OverlayEngine { session })
    }

    /// Playback timeline tick, position in microseconds.
    pub fn on_time_update(&mut self, t_us: u64) -> Result<String, JsValue> {
        let out = self.session.on_time_update(MediaTime::from_micros(t_us));
        to_js(&out)
    }

    pub fn on_play(&mut self) -> Result<String, JsValue> {
        to_js(&self.session.on_play())
    }

    pub fn on_pause(&mut self) -> Result<String, JsValue> {
        to_js(&self.session.on_pause())
    }

    pub fn on_duration_change(&mut self, duration_us: u64) -> Result<String, JsValue> {
        to_js(&self.session.on_duration_change(MediaTime::from_micros(duration_us)))
    }

    /// Native video pixel dimensions from player metadata.
    pub fn set_video_size(&mut self, width: f64, height: f64) -> Result<String, JsValue> {
        to_js(&self.session.set_video_size(width, height))
    }

    /// Container box resize. Debounced internally; the commands flow out of
    /// `on_animation_frame`.
    pub fn on_resize(&mut self, now_ms: f64, box_width: f64, box_height: f64) -> Result<String, JsValue> {
        to_js(&self.session.on_resize(now_ms, box_width, box_height))
    }

    /// Drive this from requestAnimationFrame while overlays are on screen.
    pub fn on_animation_frame(&mut self, now_ms: f64) -> Result<String, JsValue> {
        to_js(&self.session.on_animation_frame(now_ms))
    }

    pub fn on_fullscreen_change(&mut self, active: bool) -> Result<String, JsValue> {
        to_js(&self.session.on_fullscreen_change(active))
    }

    /// Completion detection input: marker strings (class names, ids) that the
    /// host's mutation observer saw appear inside the layer subtree.
    pub fn on_dom_mutation(&mut self, layer_id: &str, markers_json: &str) -> Result<String, JsValue> {
        let markers: Vec<String> = serde_json::from_str(markers_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid markers: {}", e)))?;
        let out = self
            .session
            .on_dom_mutation(&LayerId::new(layer_id), &markers);
        to_js(&out)
    }

    pub fn on_skip_click(&mut self, layer_id: &str) -> Result<String, JsValue> {
        to_js(&self.session.on_skip_click(&LayerId::new(layer_id)))
    }

    pub fn on_pointer_enter(&mut self, layer_id: &str) -> Result<String, JsValue> {
        to_js(&self.session.on_pointer_enter(&LayerId::new(layer_id)))
    }

    pub fn on_pointer_leave(&mut self, layer_id: &str) -> Result<String, JsValue> {
        to_js(&self.session.on_pointer_leave(&LayerId::new(layer_id)))
    }

    pub fn on_point_click(&mut self, layer_id: &str, point_id: &str) -> Result<String, JsValue> {
        to_js(
            &self
                .session
                .on_point_click(&LayerId::new(layer_id), &PointId::new(point_id)),
        )
    }

    /// Cart action control clicked on a commerce point.
    pub fn on_point_action(&mut self, layer_id: &str, point_id: &str) -> Result<String, JsValue> {
        to_js(
            &self
                .session
                .on_point_action(&LayerId::new(layer_id), &PointId::new(point_id)),
        )
    }

    /// Product lookup result, `{id, name, price, image, link}`.
    pub fn on_product_resolved(&mut self, detail_json: &str) -> Result<String, JsValue> {
        let detail: ProductDetail = serde_json::from_str(detail_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid product detail: {}", e)))?;
        to_js(&self.session.on_product_resolved(detail))
    }

    pub fn on_product_failed(&mut self, product_id: &str) -> Result<String, JsValue> {
        to_js(&self.session.on_product_failed(&ProductId::new(product_id)))
    }

    /// Cart mutation outcome: "ok", "partial-stock", "out-of-stock", "error".
    pub fn on_cart_result(
        &mut self,
        layer_id: &str,
        point_id: &str,
        outcome: &str,
    ) -> Result<String, JsValue> {
        let outcome: CartOutcome = serde_json::from_str(&format!("\"{}\"", outcome))
            .map_err(|e| JsValue::from_str(&format!("Invalid cart outcome: {}", e)))?;
        let out = self.session.on_cart_result(
            &LayerId::new(layer_id),
            &PointId::new(point_id),
            outcome,
        );
        to_js(&out)
    }

    /// Place a tooltip given its anchor box JSON (`{left, top, width, height}`)
    /// and the measured tooltip size from the host's hidden render pass.
    pub fn place_tooltip(
        &self,
        anchor_json: &str,
        tip_width: f64,
        tip_height: f64,
        container_width: f64,
        container_height: f64,
    ) -> Result<String, JsValue> {
        let anchor: PixelRect = serde_json::from_str(anchor_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid anchor: {}", e)))?;
        let placement =
            geometry::place_tooltip(anchor, tip_width, tip_height, container_width, container_height);
        serde_json::to_string(&placement)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Deterministic DOM container id for a layer of this instance.
    pub fn container_id(&self, layer_id: &str) -> String {
        types::container_id(self.session.instance_id(), &LayerId::new(layer_id))
    }

    pub fn blocked(&self) -> bool {
        self.session.blocked()
    }

    /// Interaction log as `{ [instanceId]: InteractionRecord[] }` for the
    /// host's namespaced storage key.
    pub fn interaction_log_json(&self) -> Result<String, JsValue> {
        self.session
            .interaction_log_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Teardown. After this every entry point returns an empty batch.
    pub fn dispose(&mut self) -> Result<String, JsValue> {
        to_js(&self.session.dispose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "instance_id": "p1",
        "box_width": 800.0,
        "box_height": 450.0,
        "overlays": [
            {
                "id": "form-1",
                "kind": "gate-form",
                "display_time": 5.0,
                "completion_signatures": ["form-confirmation"]
            },
            {
                "id": "spots",
                "kind": "hotspot",
                "display_time": 0.0,
                "end_time": 10.0,
                "points": [
                    { "id": "pt-1", "x": 50.0, "y": 50.0 }
                ]
            }
        ]
    }"#;

    #[test]
    fn engine_creation_works() {
        let engine = OverlayEngine::new(CONFIG);
        assert!(engine.is_ok());
    }

    #[test]
    fn engine_rejects_garbage_config() {
        assert!(OverlayEngine::new("not json").is_err());
    }

    #[test]
    fn time_update_returns_command_batch() {
        let mut engine = OverlayEngine::new(CONFIG).unwrap();
        let json = engine.on_time_update(6_000_000).unwrap();
        let commands: Vec<OverlayCommand> = serde_json::from_str(&json).unwrap();
        assert!(commands
            .iter()
            .any(|c| matches!(c, OverlayCommand::ShowLayer { .. })));
        assert!(engine.blocked());
    }

    #[test]
    fn container_id_accessor() {
        let engine = OverlayEngine::new(CONFIG).unwrap();
        assert_eq!(engine.container_id("form-1"), "layer-p1-form-1");
    }

    #[test]
    fn cart_outcome_parses_kebab_case() {
        let mut engine = OverlayEngine::new(CONFIG).unwrap();
        // Unknown layer/point: valid outcome still yields a toast batch.
        let json = engine.on_cart_result("shop", "pt", "out-of-stock").unwrap();
        let commands: Vec<OverlayCommand> = serde_json::from_str(&json).unwrap();
        assert!(commands
            .iter()
            .any(|c| matches!(c, OverlayCommand::ShowToast { .. })));
        assert!(engine.on_cart_result("shop", "pt", "nonsense").is_err());
    }
}
