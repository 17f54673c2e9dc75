// Commerce hotspots: decoration layers whose points carry product references.
// Product detail is fetched once per unique product id and each point resolves
// independently; a failed lookup marks only its own points. Cart actions
// disable their control for the duration of the mutation and always re-enable.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::commands::OverlayCommand;
use crate::decoration::DecorationController;
use crate::interaction::InteractionLog;
use crate::types::{
    ActionType, BlockTransition, CartOutcome, ContentRect, LayerId, MediaTime, OverlayConfig,
    PointId, ProductDetail, ProductId, ToastKind,
};

/// Specializes the decoration controller with async product lookup and cart
/// mutation handling. Fetches and cart calls run on the host; their results
/// come back as events.
pub struct CommerceController {
    base: DecorationController,
    /// Products with an outstanding fetch, mapped to the points waiting on
    /// them.
    pending: HashMap<ProductId, Vec<(LayerId, PointId)>>,
    /// Products fetched (or in flight); a failure removes its id so a layer
    /// built later retries.
    requested: HashSet<ProductId>,
    /// Resolved details, kept so layers built later render without a refetch.
    resolved: HashMap<ProductId, ProductDetail>,
    /// Points with a cart mutation in flight (double-submission guard).
    in_flight: HashSet<(LayerId, PointId)>,
}

impl CommerceController {
    pub fn new(configs: Vec<OverlayConfig>) -> Self {
        CommerceController {
            base: DecorationController::new(configs),
            pending: HashMap::new(),
            requested: HashSet::new(),
            resolved: HashMap::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn owns_layer(&self, layer_id: &LayerId) -> bool {
        self.base.owns_layer(layer_id)
    }

    /// Window evaluation plus product fetch kickoff for freshly built layers.
    pub fn on_time_update(
        &mut self,
        t: MediaTime,
        video_end: Option<MediaTime>,
        rect: &ContentRect,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) {
        let newly_built = self.base.on_time_update(t, video_end, rect, log, out);
        for layer_id in newly_built {
            self.request_products(&layer_id, out);
        }
    }

    /// One fetch per unique product id in the layer. Points whose product is
    /// already resolved render straight from the cache.
    fn request_products(&mut self, layer_id: &LayerId, out: &mut Vec<OverlayCommand>) {
        let Some(points) = self.base.points_of(layer_id) else {
            return;
        };
        let targets: Vec<(PointId, ProductId)> = points
            .iter()
            .filter_map(|p| Some((p.id.clone(), p.product_id.clone()?)))
            .collect();

        for (point_id, product_id) in targets {
            if let Some(detail) = self.resolved.get(&product_id) {
                out.push(OverlayCommand::RenderProduct {
                    layer_id: layer_id.clone(),
                    point_id,
                    detail: detail.clone(),
                });
                continue;
            }
            if self.requested.insert(product_id.clone()) {
                debug!(product = %product_id, "product lookup requested");
                out.push(OverlayCommand::FetchProduct {
                    product_id: product_id.clone(),
                });
            }
            self.pending
                .entry(product_id)
                .or_default()
                .push((layer_id.clone(), point_id));
        }
    }

    /// A product lookup succeeded. Resolutions for unknown products (layer
    /// torn down, stale fetch) are dropped without touching the DOM.
    pub fn on_product_resolved(&mut self, detail: ProductDetail, out: &mut Vec<OverlayCommand>) {
        let Some(targets) = self.pending.remove(&detail.id) else {
            return;
        };
        for (layer_id, point_id) in targets {
            out.push(OverlayCommand::RenderProduct {
                layer_id,
                point_id,
                detail: detail.clone(),
            });
        }
        self.resolved.insert(detail.id.clone(), detail);
    }

    /// A product lookup failed. Only that product's points show the
    /// "no product found" state; siblings are unaffected.
    pub fn on_product_failed(&mut self, product_id: &ProductId, out: &mut Vec<OverlayCommand>) {
        let Some(targets) = self.pending.remove(product_id) else {
            return;
        };
        warn!(product = %product_id, "product lookup failed");
        self.requested.remove(product_id);
        for (layer_id, point_id) in targets {
            out.push(OverlayCommand::RenderProductMissing { layer_id, point_id });
        }
    }

    /// Cart action clicked: disable the control immediately and hand the
    /// mutation to the host.
    pub fn on_point_action(
        &mut self,
        layer_id: &LayerId,
        point_id: &PointId,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) {
        let key = (layer_id.clone(), point_id.clone());
        if self.in_flight.contains(&key) {
            return;
        }
        let Some(product_id) = self
            .base
            .points_of(layer_id)
            .and_then(|points| points.iter().find(|p| p.id == *point_id))
            .and_then(|p| p.product_id.clone())
        else {
            return;
        };

        self.in_flight.insert(key);
        log.upgrade(layer_id, ActionType::Clicked);
        out.push(OverlayCommand::SetActionEnabled {
            layer_id: layer_id.clone(),
            point_id: point_id.clone(),
            enabled: false,
        });
        out.push(OverlayCommand::SubmitCart {
            layer_id: layer_id.clone(),
            point_id: point_id.clone(),
            product_id,
        });
    }

    /// Cart mutation finished. The control is re-enabled regardless of
    /// outcome; the toast classifies the error category.
    pub fn on_cart_result(
        &mut self,
        layer_id: &LayerId,
        point_id: &PointId,
        outcome: CartOutcome,
        out: &mut Vec<OverlayCommand>,
    ) {
        self.in_flight.remove(&(layer_id.clone(), point_id.clone()));

        let (kind, message) = match outcome {
            CartOutcome::Ok => (ToastKind::Success, "Added to cart"),
            CartOutcome::PartialStock => (
                ToastKind::PartialStock,
                "Only part of the requested quantity could be added",
            ),
            CartOutcome::OutOfStock => (ToastKind::OutOfStock, "This product is out of stock"),
            CartOutcome::Error => (ToastKind::Error, "Could not add the product to the cart"),
        };
        out.push(OverlayCommand::ShowToast {
            kind,
            message: message.to_string(),
        });
        out.push(OverlayCommand::SetActionEnabled {
            layer_id: layer_id.clone(),
            point_id: point_id.clone(),
            enabled: true,
        });
    }

    pub fn on_block_transition(&mut self, transition: BlockTransition, out: &mut Vec<OverlayCommand>) {
        self.base.on_block_transition(transition, out);
    }

    pub fn on_pointer_enter(
        &mut self,
        layer_id: &LayerId,
        playing: bool,
        log: &mut InteractionLog,
        out: &mut Vec<OverlayCommand>,
    ) {
        self.base.on_pointer_enter(layer_id, playing, log, out);
    }

    pub fn on_pointer_leave(&mut self, layer_id: &LayerId, out: &mut Vec<OverlayCommand>) {
        self.base.on_pointer_leave(layer_id, out);
    }

    pub fn on_point_click(
        &mut self,
        layer_id: &LayerId,
        point_id: &PointId,
        log: &mut InteractionLog,
    ) {
        self.base.on_point_click(layer_id, point_id, log);
    }

    pub fn reposition(&self, rect: &ContentRect, out: &mut Vec<OverlayCommand>) {
        self.base.reposition(rect, out);
    }

    pub fn on_fullscreen(&self, active: bool, out: &mut Vec<OverlayCommand>) {
        self.base.on_fullscreen(active, out);
    }
}
