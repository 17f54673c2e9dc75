// Per-player-instance orchestrator. Owns the controllers, the interaction
// log, and the geometry state; fans timeline events out and publishes the
// gating controller's block transitions to the decoration controllers.
// All entry points are idempotent and safe to re-enter within one tick.

use tracing::debug;

use crate::commands::OverlayCommand;
use crate::commerce::CommerceController;
use crate::config;
use crate::decoration::DecorationController;
use crate::error::OverlayError;
use crate::gating::GatingController;
use crate::geometry;
use crate::interaction::InteractionLog;
use crate::types::{
    BlockTransition, CartOutcome, ContentRect, EngineConfig, InstanceId, LayerId, MediaTime,
    PointId, ProductDetail, ProductId, VideoSize,
};

/// How many animation frames a fullscreen toggle defers the geometry pass,
/// letting layout settle before sizes are read.
const FULLSCREEN_DEFER_FRAMES: u8 = 2;

/// One player instance's overlay state. Created at setup, torn down with
/// `dispose`; no state outlives it.
pub struct OverlaySession {
    instance_id: InstanceId,
    gating: GatingController,
    decoration: DecorationController,
    commerce: CommerceController,
    log: InteractionLog,
    native: Option<VideoSize>,
    box_width: f64,
    box_height: f64,
    rect: ContentRect,
    duration: Option<MediaTime>,
    /// Playback state mirrored from host events and our own pause/resume
    /// commands; hover-pause consults it.
    playing: bool,
    fullscreen: bool,
    /// Last resize not yet applied: debounced, last call wins.
    pending_box: Option<(f64, f64)>,
    last_resize_ms: f64,
    resize_debounce_ms: f64,
    defer_frames: u8,
    disposed: bool,
}

impl OverlaySession {
    pub fn new(config: EngineConfig) -> Result<Self, OverlayError> {
        let prepared = config::prepare(&config)?;
        let rect = geometry::content_rect(None, config.box_width, config.box_height);
        debug!(
            instance = %config.instance_id,
            gating = prepared.gating.len(),
            decoration = prepared.decoration.len(),
            commerce = prepared.commerce.len(),
            "overlay session created"
        );
        Ok(OverlaySession {
            instance_id: config.instance_id.clone(),
            gating: GatingController::new(prepared.gating, config.gating_enabled),
            decoration: DecorationController::new(prepared.decoration),
            commerce: CommerceController::new(prepared.commerce),
            log: InteractionLog::new(config.instance_id),
            native: None,
            box_width: config.box_width,
            box_height: config.box_height,
            rect,
            duration: None,
            playing: false,
            fullscreen: false,
            pending_box: None,
            last_resize_ms: 0.0,
            resize_debounce_ms: config.resize_debounce_ms,
            defer_frames: 0,
            disposed: false,
        })
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn blocked(&self) -> bool {
        self.gating.blocked()
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Mirror our own playback side effects so state stays consistent even
    /// before the host's pause/play events echo back.
    fn finish(&mut self, out: Vec<OverlayCommand>) -> Vec<OverlayCommand> {
        for command in &out {
            match command {
                OverlayCommand::PausePlayback => self.playing = false,
                OverlayCommand::ResumePlayback => self.playing = true,
                _ => {}
            }
        }
        out
    }

    pub fn on_time_update(&mut self, t: MediaTime) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Some(transition) = self.gating.on_time_update(t, &mut self.log, &mut out) {
            self.publish_block_transition(transition, &mut out);
        }
        self.decoration
            .on_time_update(t, self.duration, &self.rect, &mut self.log, &mut out);
        self.commerce
            .on_time_update(t, self.duration, &self.rect, &mut self.log, &mut out);
        self.finish(out)
    }

    fn publish_block_transition(
        &mut self,
        transition: BlockTransition,
        out: &mut Vec<OverlayCommand>,
    ) {
        self.decoration.on_block_transition(transition, out);
        self.commerce.on_block_transition(transition, out);
    }

    pub fn on_play(&mut self) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        self.playing = true;
        let mut out = Vec::new();
        self.gating.on_play(&mut out);
        self.finish(out)
    }

    pub fn on_pause(&mut self) -> Vec<OverlayCommand> {
        if !self.disposed {
            self.playing = false;
        }
        Vec::new()
    }

    pub fn on_duration_change(&mut self, duration: MediaTime) -> Vec<OverlayCommand> {
        if !self.disposed {
            self.duration = Some(duration);
        }
        Vec::new()
    }

    /// Native dimensions arrived from player metadata: leave the full-box
    /// fallback behind and re-place everything.
    pub fn set_video_size(&mut self, width: f64, height: f64) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        self.native = VideoSize::new(width, height);
        let mut out = Vec::new();
        self.recompute_geometry(&mut out);
        out
    }

    /// Resize is debounced: the box is stored and applied on the first
    /// animation frame after the debounce window, so the last call in a burst
    /// wins.
    pub fn on_resize(&mut self, now_ms: f64, box_width: f64, box_height: f64) -> Vec<OverlayCommand> {
        if !self.disposed {
            self.pending_box = Some((box_width, box_height));
            self.last_resize_ms = now_ms;
        }
        Vec::new()
    }

    pub fn on_animation_frame(&mut self, now_ms: f64) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();

        if self.defer_frames > 0 {
            self.defer_frames -= 1;
            if self.defer_frames == 0 {
                self.recompute_geometry(&mut out);
            }
        }

        if let Some((w, h)) = self.pending_box {
            if now_ms - self.last_resize_ms >= self.resize_debounce_ms {
                self.pending_box = None;
                self.box_width = w;
                self.box_height = h;
                self.recompute_geometry(&mut out);
            }
        }
        out
    }

    /// Reparent overlay subtrees and schedule a geometry pass two frames out,
    /// once layout has settled.
    pub fn on_fullscreen_change(&mut self, active: bool) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        self.fullscreen = active;
        let mut out = Vec::new();
        self.gating.on_fullscreen(active, &mut out);
        self.decoration.on_fullscreen(active, &mut out);
        self.commerce.on_fullscreen(active, &mut out);
        self.defer_frames = FULLSCREEN_DEFER_FRAMES;
        out
    }

    fn recompute_geometry(&mut self, out: &mut Vec<OverlayCommand>) {
        self.rect = geometry::content_rect(self.native, self.box_width, self.box_height);
        self.decoration.reposition(&self.rect, out);
        self.commerce.reposition(&self.rect, out);
    }

    pub fn on_dom_mutation(&mut self, layer_id: &LayerId, markers: &[String]) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.gating
            .on_dom_mutation(layer_id, markers, &mut self.log, &mut out);
        out
    }

    pub fn on_skip_click(&mut self, layer_id: &LayerId) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Some(transition) = self.gating.on_skip_click(layer_id, &mut self.log, &mut out) {
            self.publish_block_transition(transition, &mut out);
        }
        self.finish(out)
    }

    pub fn on_pointer_enter(&mut self, layer_id: &LayerId) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let playing = self.playing;
        let mut out = Vec::new();
        if self.decoration.owns_layer(layer_id) {
            self.decoration
                .on_pointer_enter(layer_id, playing, &mut self.log, &mut out);
        } else {
            self.commerce
                .on_pointer_enter(layer_id, playing, &mut self.log, &mut out);
        }
        self.finish(out)
    }

    pub fn on_pointer_leave(&mut self, layer_id: &LayerId) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        if self.decoration.owns_layer(layer_id) {
            self.decoration.on_pointer_leave(layer_id, &mut out);
        } else {
            self.commerce.on_pointer_leave(layer_id, &mut out);
        }
        self.finish(out)
    }

    pub fn on_point_click(&mut self, layer_id: &LayerId, point_id: &PointId) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        if self.decoration.owns_layer(layer_id) {
            self.decoration
                .on_point_click(layer_id, point_id, &mut self.log);
        } else {
            self.commerce
                .on_point_click(layer_id, point_id, &mut self.log);
        }
        Vec::new()
    }

    pub fn on_point_action(&mut self, layer_id: &LayerId, point_id: &PointId) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.commerce
            .on_point_action(layer_id, point_id, &mut self.log, &mut out);
        out
    }

    pub fn on_product_resolved(&mut self, detail: ProductDetail) -> Vec<OverlayCommand> {
        // An in-flight fetch may resolve after teardown; the DOM must not be
        // touched then.
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.commerce.on_product_resolved(detail, &mut out);
        out
    }

    pub fn on_product_failed(&mut self, product_id: &ProductId) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.commerce.on_product_failed(product_id, &mut out);
        out
    }

    pub fn on_cart_result(
        &mut self,
        layer_id: &LayerId,
        point_id: &PointId,
        outcome: CartOutcome,
    ) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.commerce
            .on_cart_result(layer_id, point_id, outcome, &mut out);
        out
    }

    pub fn interaction_log_json(&self) -> Result<String, OverlayError> {
        self.log.to_json()
    }

    /// Teardown. The host unsubscribes its own listeners; the engine stops
    /// any live mutation watch and ignores every event from here on.
    pub fn dispose(&mut self) -> Vec<OverlayCommand> {
        if self.disposed {
            return Vec::new();
        }
        debug!(instance = %self.instance_id, "overlay session disposed");
        self.disposed = true;
        let mut out = Vec::new();
        self.gating.on_dispose(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CoordBasis, EngineConfig, OverlayConfig, OverlayKind, PointConfig, ProductId,
    };

    fn gate(id: &str, display_time: f64) -> OverlayConfig {
        OverlayConfig {
            id: LayerId::new(id),
            name: id.to_string(),
            kind: OverlayKind::GateForm,
            display_time,
            end_time: None,
            allow_skip: true,
            skip_label: "Skip".to_string(),
            continue_label: "Continue".to_string(),
            completion_signatures: vec!["form-confirmation".to_string()],
            hover_pause: false,
            style: serde_json::Value::Null,
            points: Vec::new(),
            source_index: 0,
        }
    }

    fn hotspot(id: &str, kind: OverlayKind, start: f64, end: f64, product: Option<&str>) -> OverlayConfig {
        OverlayConfig {
            id: LayerId::new(id),
            name: id.to_string(),
            kind,
            display_time: start,
            end_time: Some(end),
            allow_skip: true,
            skip_label: "Skip".to_string(),
            continue_label: "Continue".to_string(),
            completion_signatures: Vec::new(),
            hover_pause: false,
            style: serde_json::Value::Null,
            points: vec![PointConfig {
                id: PointId::new("pt-1"),
                x: 50.0,
                y: 50.0,
                diameter: 10.0,
                basis: CoordBasis::Percent,
                link: None,
                style: serde_json::Value::Null,
                product_id: product.map(ProductId::new),
            }],
            source_index: 0,
        }
    }

    fn session(overlays: Vec<OverlayConfig>) -> OverlaySession {
        OverlaySession::new(EngineConfig {
            instance_id: InstanceId::new("p1"),
            overlays,
            missing_layers: Vec::new(),
            gating_enabled: true,
            box_width: 800.0,
            box_height: 450.0,
            resize_debounce_ms: 150.0,
        })
        .unwrap()
    }

    fn secs(s: f64) -> MediaTime {
        MediaTime::from_secs(s).unwrap()
    }

    fn shown(out: &[OverlayCommand]) -> Vec<&str> {
        out.iter()
            .filter_map(|c| match c {
                OverlayCommand::ShowLayer { layer_id } => Some(layer_id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn seek_past_both_gates_reveals_them_in_order() {
        let mut session = session(vec![gate("form", 5.0), gate("cta", 10.0)]);
        session.on_play();

        let out = session.on_time_update(secs(12.0));
        assert_eq!(shown(&out), vec!["form"]);
        assert!(out.iter().any(|c| matches!(c, OverlayCommand::PausePlayback)));
        assert!(!session.playing());

        // While blocked, further ticks reveal nothing.
        let out = session.on_time_update(secs(12.2));
        assert!(shown(&out).is_empty());

        let out = session.on_skip_click(&LayerId::new("form"));
        assert!(out.iter().any(|c| matches!(c, OverlayCommand::ResumePlayback)));
        assert!(session.playing());

        let out = session.on_time_update(secs(12.4));
        assert_eq!(shown(&out), vec!["cta"]);
    }

    #[test]
    fn decorations_overlap_but_stay_visible_under_a_gate() {
        let mut session = session(vec![
            hotspot("spots", OverlayKind::Hotspot, 0.0, 10.0, None),
            hotspot("shop", OverlayKind::CommerceHotspot, 5.0, 15.0, Some("sku-1")),
            gate("gate", 6.0),
        ]);

        let out = session.on_time_update(secs(1.0));
        assert!(out.iter().any(|c| matches!(
            c,
            OverlayCommand::BuildPoints { layer_id, .. } if layer_id.as_str() == "spots"
        )));

        let out = session.on_time_update(secs(6.0));
        assert!(session.blocked());
        let overlapped: Vec<&str> = out
            .iter()
            .filter_map(|c| match c {
                OverlayCommand::AddClass { layer_id, class } if class == "overlapped" => {
                    Some(layer_id.as_str())
                }
                _ => None,
            })
            .collect();
        assert!(overlapped.contains(&"spots"));
        assert!(overlapped.contains(&"shop"));
        // Neither decoration layer is hidden by the gating overlay.
        assert!(!out.iter().any(|c| matches!(
            c,
            OverlayCommand::AddClass { class, .. } if class == "hidden"
        )));

        let out = session.on_skip_click(&LayerId::new("gate"));
        assert!(out.iter().any(|c| matches!(
            c,
            OverlayCommand::RemoveClass { layer_id, class }
                if class == "overlapped" && layer_id.as_str() == "spots"
        )));
    }

    #[test]
    fn product_failures_are_isolated_per_point() {
        let mut session = session(vec![
            hotspot("shop-a", OverlayKind::CommerceHotspot, 0.0, 20.0, Some("sku-fail")),
            hotspot("shop-b", OverlayKind::CommerceHotspot, 0.0, 20.0, Some("sku-ok")),
        ]);
        session.on_time_update(secs(1.0));

        let out = session.on_product_failed(&ProductId::new("sku-fail"));
        assert!(out.iter().any(|c| matches!(
            c,
            OverlayCommand::RenderProductMissing { layer_id, .. } if layer_id.as_str() == "shop-a"
        )));

        let out = session.on_product_resolved(ProductDetail {
            id: ProductId::new("sku-ok"),
            name: "Widget".to_string(),
            price: "9.99".to_string(),
            image: None,
            link: None,
        });
        assert!(out.iter().any(|c| matches!(
            c,
            OverlayCommand::RenderProduct { layer_id, .. } if layer_id.as_str() == "shop-b"
        )));
    }

    #[test]
    fn resize_scales_points_proportionally() {
        let mut session = session(vec![hotspot("spots", OverlayKind::Hotspot, 0.0, 60.0, None)]);
        session.set_video_size(1920.0, 1080.0);

        let out = session.on_time_update(secs(1.0));
        let built = out
            .iter()
            .find_map(|c| match c {
                OverlayCommand::BuildPoints { points, .. } => Some(points.clone()),
                _ => None,
            })
            .unwrap();
        assert!((built[0].x - 400.0).abs() < 1e-9);
        assert!((built[0].y - 225.0).abs() < 1e-9);

        session.on_resize(1000.0, 400.0, 225.0);
        // Inside the debounce window: nothing yet.
        assert!(session.on_animation_frame(1100.0).is_empty());
        let out = session.on_animation_frame(1200.0);
        let moved = out
            .iter()
            .find_map(|c| match c {
                OverlayCommand::RepositionPoints { points, .. } => Some(points.clone()),
                _ => None,
            })
            .unwrap();
        assert!((moved[0].x - 200.0).abs() < 1e-9);
        assert!((moved[0].y - 112.5).abs() < 1e-9);
        assert!((moved[0].diameter - built[0].diameter / 2.0).abs() < 1e-9);
    }

    #[test]
    fn fullscreen_defers_geometry_two_frames() {
        let mut session = session(vec![hotspot("spots", OverlayKind::Hotspot, 0.0, 60.0, None)]);
        session.on_time_update(secs(1.0));

        let out = session.on_fullscreen_change(true);
        assert!(out.iter().any(|c| matches!(
            c,
            OverlayCommand::Reparent { fullscreen: true, .. }
        )));

        // First frame: still waiting for layout.
        assert!(session.on_animation_frame(0.0).is_empty());
        // Second frame: geometry pass runs.
        let out = session.on_animation_frame(16.0);
        assert!(out
            .iter()
            .any(|c| matches!(c, OverlayCommand::RepositionPoints { .. })));
    }

    #[test]
    fn play_guard_repauses_while_blocked() {
        let mut session = session(vec![gate("form", 5.0)]);
        session.on_time_update(secs(5.0));
        assert!(session.blocked());

        let out = session.on_play();
        assert!(out.iter().any(|c| matches!(c, OverlayCommand::PausePlayback)));
        assert!(!session.playing());
    }

    #[test]
    fn completion_then_skip_logs_submitted_once() {
        let mut session = session(vec![gate("form", 5.0)]);
        session.on_time_update(secs(5.0));
        session.on_dom_mutation(&LayerId::new("form"), &["form-confirmation".to_string()]);
        session.on_skip_click(&LayerId::new("form"));

        let json = session.interaction_log_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let records = value["p1"].as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["action_type"], "submitted");
    }

    #[test]
    fn dispose_silences_every_entry_point() {
        let mut session = session(vec![
            gate("form", 5.0),
            hotspot("shop", OverlayKind::CommerceHotspot, 0.0, 20.0, Some("sku-1")),
        ]);
        session.on_time_update(secs(1.0));
        session.dispose();

        assert!(session.on_time_update(secs(5.0)).is_empty());
        assert!(session.on_fullscreen_change(true).is_empty());
        assert!(session.on_animation_frame(1000.0).is_empty());
        // Late product resolution must not touch the DOM.
        assert!(session
            .on_product_resolved(ProductDetail {
                id: ProductId::new("sku-1"),
                name: "Widget".to_string(),
                price: "9.99".to_string(),
                image: None,
                link: None,
            })
            .is_empty());
        // Dispose is idempotent.
        assert!(session.dispose().is_empty());
    }

    #[test]
    fn hover_pause_uses_tracked_playback_state() {
        let mut cfg = hotspot("spots", OverlayKind::Hotspot, 0.0, 60.0, None);
        cfg.hover_pause = true;
        let mut session = session(vec![cfg]);
        session.on_time_update(secs(1.0));

        session.on_play();
        let out = session.on_pointer_enter(&LayerId::new("spots"));
        assert!(out.iter().any(|c| matches!(c, OverlayCommand::PausePlayback)));
        let out = session.on_pointer_leave(&LayerId::new("spots"));
        assert!(out.iter().any(|c| matches!(c, OverlayCommand::ResumePlayback)));
    }
}
