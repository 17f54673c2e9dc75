// Concurrent, non-blocking hotspot layers. Each layer is visible iff playback
// is inside its time window; point DOM is built lazily, once per session, and
// hidden/shown by class toggles afterwards. Decoration layers never pause or
// resume playback themselves except through opt-in hover-pause.

use tracing::debug;

use crate::commands::OverlayCommand;
use crate::geometry;
use crate::interaction::InteractionLog;
use crate::types::{
    ActionType, BlockTransition, ContentRect, LayerId, MediaTime, OverlayConfig, PointConfig,
    PointId,
};

const HIDDEN_CLASS: &str = "hidden";
const OVERLAPPED_CLASS: &str = "overlapped";
const FULLSCREEN_CLASS: &str = "fullscreen";

struct DecoLayer {
    config: OverlayConfig,
    start: MediaTime,
    end: Option<MediaTime>,
    initialized: bool,
    visible: bool,
    /// Shared per layer, not per point: the most recent hover decides whether
    /// leave resumes playback.
    was_playing_before_hover: bool,
}

impl DecoLayer {
    fn active_at(&self, t: MediaTime, video_end: Option<MediaTime>) -> bool {
        if t < self.start {
            return false;
        }
        match self.end.or(video_end) {
            Some(end) => t < end,
            None => true,
        }
    }
}

/// Owns the time-windowed decoration layers of one player instance.
pub struct DecorationController {
    layers: Vec<DecoLayer>,
    /// Mirrors the gating controller's block state, fed through explicit
    /// block/unblock transitions. Purely cosmetic for decorations.
    overlapped: bool,
}

impl DecorationController {
    pub fn new(configs: Vec<OverlayConfig>) -> Self {
        let layers = configs
            .into_iter()
            .filter_map(|config| {
                let start = MediaTime::from_secs(config.display_time)?;
                let end = config.end_time.and_then(MediaTime::from_secs);
                Some(DecoLayer {
                    config,
                    start,
                    end,
                    initialized: false,
                    visible: false,
                    was_playing_before_hover: false,
                })
            })
            .collect();
        DecorationController {
            layers,
            overlapped: false,
        }
    }

    pub fn owns_layer(&self, layer_id: &LayerId) -> bool {
        self.layers.iter().any(|l| l.config.id == *layer_id)
    }

    pub fn points_of(&self, layer_id: &LayerId) -> Option<&[PointConfig]> {
        self.layers
            .iter()
            .find(|l| l.config.id == *layer_id)
            .map(|l| l.config.points.as_slice())
    }

    /// Evaluate every layer's window independently. Returns the ids of layers
    /// whose point DOM was built during this call (at most once per layer per
    /// session, guarded by `initialized`).
    pub fn on_time_update(
        &mut self,
        t: MediaTime,
        video_end: Option<MediaTime>,
        rect: &ContentRect,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) -> Vec<LayerId> {
        let mut newly_built = Vec::new();
        let overlapped = self.overlapped;

        for layer in &mut self.layers {
            let active = layer.active_at(t, video_end);
            if active && !layer.visible {
                if !layer.initialized {
                    debug!(layer = %layer.config.id, "building decoration points");
                    layer.initialized = true;
                    log.seed(
                        &layer.config.id,
                        layer.config.kind,
                        &layer.config.name,
                        t.as_secs(),
                    );
                    out.push(OverlayCommand::BuildPoints {
                        layer_id: layer.config.id.clone(),
                        points: geometry::map_points(&layer.config.points, rect),
                    });
                    if overlapped {
                        out.push(OverlayCommand::AddClass {
                            layer_id: layer.config.id.clone(),
                            class: OVERLAPPED_CLASS.to_string(),
                        });
                    }
                    newly_built.push(layer.config.id.clone());
                }
                layer.visible = true;
                out.push(OverlayCommand::RemoveClass {
                    layer_id: layer.config.id.clone(),
                    class: HIDDEN_CLASS.to_string(),
                });
            } else if !active && layer.visible {
                // DOM is retained; only the class toggles.
                layer.visible = false;
                out.push(OverlayCommand::AddClass {
                    layer_id: layer.config.id.clone(),
                    class: HIDDEN_CLASS.to_string(),
                });
            }
        }

        newly_built
    }

    /// Explicit publish/subscribe from the gating controller: toggle the
    /// overlapped marker, nothing else. Decorations stay positioned and
    /// visible underneath a gating overlay.
    pub fn on_block_transition(&mut self, transition: BlockTransition, out: &mut Vec<OverlayCommand>) {
        self.overlapped = transition == BlockTransition::Blocked;
        for layer in &self.layers {
            let class = OVERLAPPED_CLASS.to_string();
            let layer_id = layer.config.id.clone();
            if self.overlapped {
                out.push(OverlayCommand::AddClass { layer_id, class });
            } else {
                out.push(OverlayCommand::RemoveClass { layer_id, class });
            }
        }
    }

    /// Opt-in hover-to-pause. Records whether playback was running so leave
    /// can resume only in that case.
    pub fn on_pointer_enter(
        &mut self,
        layer_id: &LayerId,
        playing: bool,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.config.id == *layer_id) else {
            return;
        };
        if !layer.config.hover_pause {
            return;
        }
        layer.was_playing_before_hover = playing;
        if playing {
            out.push(OverlayCommand::PausePlayback);
        }
        log.upgrade(layer_id, ActionType::Hovered);
    }

    pub fn on_pointer_leave(&mut self, layer_id: &LayerId, out: &mut Vec<OverlayCommand>) {
        let Some(layer) = self.layers.iter_mut().find(|l| l.config.id == *layer_id) else {
            return;
        };
        if layer.config.hover_pause && layer.was_playing_before_hover {
            layer.was_playing_before_hover = false;
            out.push(OverlayCommand::ResumePlayback);
        }
    }

    /// A point was clicked. Navigation is the host's side of the link target;
    /// the engine only logs.
    pub fn on_point_click(
        &mut self,
        layer_id: &LayerId,
        _point_id: &PointId,
        log: &mut InteractionLog,
    ) {
        if self.owns_layer(layer_id) {
            log.upgrade(layer_id, ActionType::Clicked);
        }
    }

    /// Re-map every built layer's points onto a freshly computed content rect.
    pub fn reposition(&self, rect: &ContentRect, out: &mut Vec<OverlayCommand>) {
        for layer in self.layers.iter().filter(|l| l.initialized) {
            out.push(OverlayCommand::RepositionPoints {
                layer_id: layer.config.id.clone(),
                points: geometry::map_points(&layer.config.points, rect),
            });
        }
    }

    /// Reparent built layers across a fullscreen toggle.
    pub fn on_fullscreen(&self, active: bool, out: &mut Vec<OverlayCommand>) {
        for layer in self.layers.iter().filter(|l| l.initialized) {
            out.push(OverlayCommand::Reparent {
                layer_id: layer.config.id.clone(),
                fullscreen: active,
            });
            let class = FULLSCREEN_CLASS.to_string();
            let layer_id = layer.config.id.clone();
            if active {
                out.push(OverlayCommand::AddClass { layer_id, class });
            } else {
                out.push(OverlayCommand::RemoveClass { layer_id, class });
            }
        }
    }
}
