// Sequential gating state machine. At most one blocking overlay is unblocked
// per instance at any instant; the cursor only ever moves forward.

use tracing::debug;

use crate::commands::OverlayCommand;
use crate::interaction::InteractionLog;
use crate::types::{ActionType, BlockTransition, LayerId, MediaTime, OverlayConfig};

struct GateLayer {
    config: OverlayConfig,
    display: MediaTime,
    visible: bool,
    /// One-shot: set on the first completion-signature match.
    submitted: bool,
}

/// Owns the ordered sequence of blocking overlays (forms/CTAs/polls) and
/// enforces exclusivity, pause/resume, skip, and completion detection.
pub struct GatingController {
    sequence: Vec<GateLayer>,
    cursor: usize,
    blocked: bool,
    /// Capability flag consulted directly; external hooks flip this instead
    /// of substituting methods.
    enabled: bool,
}

impl GatingController {
    /// `configs` must already be validated and stable-sorted by display time
    /// (see `config::prepare`).
    pub fn new(configs: Vec<OverlayConfig>, enabled: bool) -> Self {
        let sequence = configs
            .into_iter()
            .filter_map(|config| {
                let display = MediaTime::from_secs(config.display_time)?;
                Some(GateLayer {
                    config,
                    display,
                    visible: false,
                    submitted: false,
                })
            })
            .collect();
        GatingController {
            sequence,
            cursor: 0,
            blocked: false,
            enabled,
        }
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Id of the currently visible gating overlay, if any.
    pub fn visible_layer(&self) -> Option<&LayerId> {
        self.sequence
            .iter()
            .find(|l| l.visible)
            .map(|l| &l.config.id)
    }

    pub fn owns_layer(&self, layer_id: &LayerId) -> bool {
        self.sequence.iter().any(|l| l.config.id == *layer_id)
    }

    /// Activate the cursor overlay once playback reaches its display time.
    /// Seeking straight past several overlays still reveals them one at a
    /// time: only the cursor overlay can activate, and the cursor advances
    /// only through skip.
    pub fn on_time_update(
        &mut self,
        t: MediaTime,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) -> Option<BlockTransition> {
        if !self.enabled || self.blocked {
            return None;
        }
        let layer = self.sequence.get_mut(self.cursor)?;
        if layer.visible || t < layer.display {
            return None;
        }

        debug!(layer = %layer.config.id, t = t.as_secs(), "gating overlay activated");
        layer.visible = true;
        self.blocked = true;

        log.seed(
            &layer.config.id,
            layer.config.kind,
            &layer.config.name,
            t.as_secs(),
        );

        out.push(OverlayCommand::ShowLayer {
            layer_id: layer.config.id.clone(),
        });
        out.push(OverlayCommand::PausePlayback);
        out.push(OverlayCommand::SetControlsEnabled { enabled: false });
        out.push(OverlayCommand::SetSkipControl {
            layer_id: layer.config.id.clone(),
            label: layer.config.skip_label.clone(),
            visible: layer.config.allow_skip,
        });
        if !layer.config.completion_signatures.is_empty() {
            out.push(OverlayCommand::WatchCompletion {
                layer_id: layer.config.id.clone(),
                signatures: layer.config.completion_signatures.clone(),
            });
        }
        Some(BlockTransition::Blocked)
    }

    /// Completion detection: the host reports marker strings that appeared in
    /// the layer subtree; the first signature match flips the skip control to
    /// the continue label and upgrades the record to submitted.
    pub fn on_dom_mutation(
        &mut self,
        layer_id: &LayerId,
        markers: &[String],
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) {
        let Some(layer) = self.sequence.iter_mut().find(|l| l.config.id == *layer_id) else {
            return;
        };
        // Mutations for a hidden layer or after the first match are stale.
        if !layer.visible || layer.submitted {
            return;
        }
        let matched = layer
            .config
            .completion_signatures
            .iter()
            .any(|sig| markers.iter().any(|m| m == sig));
        if !matched {
            return;
        }

        debug!(layer = %layer_id, "completion signature matched");
        layer.submitted = true;
        log.upgrade(layer_id, ActionType::Submitted);

        out.push(OverlayCommand::SetSkipControl {
            layer_id: layer_id.clone(),
            label: layer.config.continue_label.clone(),
            visible: true,
        });
        out.push(OverlayCommand::StopWatching {
            layer_id: layer_id.clone(),
        });
    }

    /// User clicked skip/continue. Tolerant of stale handlers: hiding applies
    /// to whichever layer the click names, but the cursor advances only when
    /// that layer is the cursor layer.
    pub fn on_skip_click(
        &mut self,
        layer_id: &LayerId,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) -> Option<BlockTransition> {
        let index = self
            .sequence
            .iter()
            .position(|l| l.config.id == *layer_id)?;
        if !self.sequence[index].visible {
            return None;
        }

        debug!(layer = %layer_id, "gating overlay skipped");
        self.sequence[index].visible = false;
        self.blocked = false;
        if index == self.cursor {
            self.cursor += 1;
        }

        // The activation seeded a "skipped" record; if completion already
        // upgraded it to "submitted" this is a no-op (first write wins).
        if !self.sequence[index].submitted {
            log.upgrade(layer_id, ActionType::Skipped);
        }

        out.push(OverlayCommand::HideLayer {
            layer_id: layer_id.clone(),
        });
        out.push(OverlayCommand::StopWatching {
            layer_id: layer_id.clone(),
        });
        out.push(OverlayCommand::SetControlsEnabled { enabled: true });
        out.push(OverlayCommand::ResumePlayback);
        Some(BlockTransition::Unblocked)
    }

    /// Play guard: a native play signal while a gating overlay is visible is
    /// re-paused immediately. Gating cannot be bypassed by direct play calls.
    pub fn on_play(&self, out: &mut Vec<OverlayCommand>) {
        if self.blocked {
            out.push(OverlayCommand::PausePlayback);
        }
    }

    /// Reparent the visible overlay on fullscreen toggle. No state mutation
    /// beyond the marker class.
    pub fn on_fullscreen(&self, active: bool, out: &mut Vec<OverlayCommand>) {
        let Some(layer_id) = self.visible_layer() else {
            return;
        };
        out.push(OverlayCommand::Reparent {
            layer_id: layer_id.clone(),
            fullscreen: active,
        });
        let class = "fullscreen".to_string();
        if active {
            out.push(OverlayCommand::AddClass {
                layer_id: layer_id.clone(),
                class,
            });
        } else {
            out.push(OverlayCommand::RemoveClass {
                layer_id: layer_id.clone(),
                class,
            });
        }
    }

    /// Teardown: stop any live mutation watch.
    pub fn on_dispose(&self, out: &mut Vec<OverlayCommand>) {
        if let Some(layer_id) = self.visible_layer() {
            out.push(OverlayCommand::StopWatching {
                layer_id: layer_id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstanceId, OverlayKind};
    use proptest::prelude::*;

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

    fn log() -> InteractionLog {
        InteractionLog::new(InstanceId::new("p1"))
    }

    fn secs(s: f64) -> MediaTime {
        MediaTime::from_secs(s).unwrap()
    }

    fn has_pause(out: &[OverlayCommand]) -> bool {
        out.iter().any(|c| matches!(c, OverlayCommand::PausePlayback))
    }

    #[test]
    fn activation_pauses_and_blocks() {
        let mut ctl = GatingController::new(vec![gate("a", 5.0)], true);
        let mut log = log();
        let mut out = Vec::new();

        assert!(ctl.on_time_update(secs(4.9), &mut log, &mut out).is_none());
        assert!(out.is_empty());

        let tr = ctl.on_time_update(secs(5.0), &mut log, &mut out);
        assert_eq!(tr, Some(BlockTransition::Blocked));
        assert!(ctl.blocked());
        assert!(has_pause(&out));
        assert!(out
            .iter()
            .any(|c| matches!(c, OverlayCommand::SetControlsEnabled { enabled: false })));
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].action_type, ActionType::Skipped);
    }

    #[test]
    fn second_overlay_waits_for_first_skip_even_across_seek() {
        // Form at 5, CTA at 10; seek straight to 12.
        let mut ctl = GatingController::new(vec![gate("form", 5.0), gate("cta", 10.0)], true);
        let mut log = log();
        let mut out = Vec::new();

        ctl.on_time_update(secs(12.0), &mut log, &mut out);
        assert_eq!(ctl.visible_layer().unwrap().as_str(), "form");

        // Blocked: further time updates never reveal the CTA.
        let mut out2 = Vec::new();
        ctl.on_time_update(secs(12.5), &mut log, &mut out2);
        assert!(out2.is_empty());
        assert_eq!(ctl.cursor(), 0);

        // Skip the form; the CTA only becomes eligible afterwards.
        let tr = ctl.on_skip_click(&LayerId::new("form"), &mut log, &mut out2);
        assert_eq!(tr, Some(BlockTransition::Unblocked));
        assert_eq!(ctl.cursor(), 1);

        let mut out3 = Vec::new();
        ctl.on_time_update(secs(12.5), &mut log, &mut out3);
        assert_eq!(ctl.visible_layer().unwrap().as_str(), "cta");
    }

    #[test]
    fn completion_flips_control_and_logs_submitted_once() {
        let mut ctl = GatingController::new(vec![gate("form", 5.0)], true);
        let mut log = log();
        let mut out = Vec::new();
        ctl.on_time_update(secs(5.0), &mut log, &mut out);

        let markers = vec!["form-confirmation".to_string()];
        let mut out2 = Vec::new();
        ctl.on_dom_mutation(&LayerId::new("form"), &markers, &mut log, &mut out2);
        assert!(out2.iter().any(|c| matches!(
            c,
            OverlayCommand::SetSkipControl { label, visible: true, .. } if label == "Continue"
        )));
        assert!(out2
            .iter()
            .any(|c| matches!(c, OverlayCommand::StopWatching { .. })));
        assert_eq!(log.entries()[0].action_type, ActionType::Submitted);

        // Repeated mutation reports are stale after the first match.
        let mut out3 = Vec::new();
        ctl.on_dom_mutation(&LayerId::new("form"), &markers, &mut log, &mut out3);
        assert!(out3.is_empty());
    }

    #[test]
    fn skip_after_submit_keeps_submitted() {
        let mut ctl = GatingController::new(vec![gate("form", 5.0)], true);
        let mut log = log();
        let mut out = Vec::new();
        ctl.on_time_update(secs(5.0), &mut log, &mut out);
        ctl.on_dom_mutation(
            &LayerId::new("form"),
            &["form-confirmation".to_string()],
            &mut log,
            &mut out,
        );
        ctl.on_skip_click(&LayerId::new("form"), &mut log, &mut out);
        assert_eq!(log.entries()[0].action_type, ActionType::Submitted);
    }

    #[test]
    fn unmatched_markers_do_nothing() {
        let mut ctl = GatingController::new(vec![gate("form", 5.0)], true);
        let mut log = log();
        let mut out = Vec::new();
        ctl.on_time_update(secs(5.0), &mut log, &mut out);

        let mut out2 = Vec::new();
        ctl.on_dom_mutation(
            &LayerId::new("form"),
            &["unrelated-class".to_string()],
            &mut log,
            &mut out2,
        );
        assert!(out2.is_empty());
        assert_eq!(log.entries()[0].action_type, ActionType::Skipped);
    }

    #[test]
    fn play_while_blocked_is_repaused() {
        let mut ctl = GatingController::new(vec![gate("form", 5.0)], true);
        let mut log = log();
        let mut out = Vec::new();
        ctl.on_time_update(secs(5.0), &mut log, &mut out);

        let mut out2 = Vec::new();
        ctl.on_play(&mut out2);
        assert!(has_pause(&out2));

        // Not blocked: play passes through.
        ctl.on_skip_click(&LayerId::new("form"), &mut log, &mut out2);
        let mut out3 = Vec::new();
        ctl.on_play(&mut out3);
        assert!(out3.is_empty());
    }

    #[test]
    fn stale_skip_does_not_advance_cursor() {
        let mut ctl = GatingController::new(vec![gate("a", 5.0), gate("b", 10.0)], true);
        let mut log = log();
        let mut out = Vec::new();
        ctl.on_time_update(secs(5.0), &mut log, &mut out);
        ctl.on_skip_click(&LayerId::new("a"), &mut log, &mut out);
        ctl.on_time_update(secs(10.0), &mut log, &mut out);
        assert_eq!(ctl.cursor(), 1);

        // A second click on the already-hidden first overlay is ignored.
        let tr = ctl.on_skip_click(&LayerId::new("a"), &mut log, &mut out);
        assert!(tr.is_none());
        assert_eq!(ctl.cursor(), 1);
        assert_eq!(ctl.visible_layer().unwrap().as_str(), "b");
    }

    #[test]
    fn disabled_gating_never_activates() {
        let mut ctl = GatingController::new(vec![gate("a", 5.0)], false);
        let mut log = log();
        let mut out = Vec::new();
        assert!(ctl.on_time_update(secs(60.0), &mut log, &mut out).is_none());
        assert!(out.is_empty());
        assert!(!ctl.blocked());
    }

    #[test]
    fn fullscreen_reparents_visible_overlay_only() {
        let mut ctl = GatingController::new(vec![gate("a", 5.0)], true);
        let mut log = log();
        let mut out = Vec::new();

        ctl.on_fullscreen(true, &mut out);
        assert!(out.is_empty());

        ctl.on_time_update(secs(5.0), &mut log, &mut out);
        let mut out2 = Vec::new();
        ctl.on_fullscreen(true, &mut out2);
        assert!(out2
            .iter()
            .any(|c| matches!(c, OverlayCommand::Reparent { fullscreen: true, .. })));
    }

    proptest! {
        /// The cursor is monotonically non-decreasing and never exceeds the
        /// sequence length, under arbitrary interleavings of time updates,
        /// skips, mutations, and play signals.
        #[test]
        fn cursor_is_monotone_and_bounded(events in prop::collection::vec((0u8..4, 0u8..3, 0.0f64..30.0), 0..200)) {
            let mut ctl = GatingController::new(
                vec![gate("g0", 3.0), gate("g1", 3.0), gate("g2", 11.0)],
                true,
            );
            let mut log = log();
            let ids = [LayerId::new("g0"), LayerId::new("g1"), LayerId::new("g2")];
            let mut last_cursor = 0;

            for (kind, which, t) in events {
                let mut out = Vec::new();
                match kind {
                    0 => { ctl.on_time_update(secs(t), &mut log, &mut out); }
                    1 => { ctl.on_skip_click(&ids[which as usize], &mut log, &mut out); }
                    2 => {
                        ctl.on_dom_mutation(
                            &ids[which as usize],
                            &["form-confirmation".to_string()],
                            &mut log,
                            &mut out,
                        );
                    }
                    _ => { ctl.on_play(&mut out); }
                }
                prop_assert!(ctl.cursor() >= last_cursor);
                prop_assert!(ctl.cursor() <= ctl.len());
                // Exclusivity: at most one visible overlay.
                let visible = ctl.sequence.iter().filter(|l| l.visible).count();
                prop_assert!(visible <= 1);
                prop_assert_eq!(visible == 1, ctl.blocked());
                last_cursor = ctl.cursor();
            }
        }
    }
}
