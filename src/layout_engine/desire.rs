//! Desired state, rebuilt from the current state and the configuration on every pass.

use tracing::trace;

use super::calc::{auto_scale, layout_dimensions, optimal_mode, order_heads, position_heads};
use crate::common::config::Config;
use crate::model::info::report_no_mode;
use crate::model::{Displ, Head, Scale, Transform};

pub fn desire(displ: &mut Displ) {
    let config = &displ.config;
    let heads = displ.output_manager.heads_mut();
    let sole = heads.len() == 1;

    for head in heads.iter_mut() {
        // Properties in flight keep their desired values until resolved.
        if !head.pending.is_empty() {
            continue;
        }

        head.reset_desired();
        head.max_preferred_refresh =
            config.max_preferred_refresh.iter().any(|pattern| head.matches(pattern));

        desire_enabled(head, config, sole);
        desire_mode(head);
        desire_scale(head, config);
        desire_transform(head, config);

        if head.desired.enabled {
            if let Some(mode) = head.desired_mode() {
                let (width, height) =
                    layout_dimensions(mode, head.desired.transform, head.desired.scale);
                head.desired.width = width;
                head.desired.height = height;
            }
        }
    }

    let placements = {
        let ordered = order_heads(&config.order, displ.output_manager.heads());
        position_heads(&ordered, config.arrange, config.align)
    };

    for placement in placements {
        let Some(head) = displ.output_manager.head_mut(placement.head) else {
            continue;
        };
        if !head.pending.is_empty() {
            continue;
        }
        trace!(head = head.name(), x = placement.x, y = placement.y, "placed");
        head.desired.x = placement.x;
        head.desired.y = placement.y;
    }
}

fn desire_enabled(head: &mut Head, config: &Config, sole: bool) {
    // A lone laptop panel stays on so the machine can sleep cleanly.
    head.desired.enabled = !head.lid_closed || sole;

    if config.disabled.iter().any(|pattern| head.matches(pattern)) {
        head.desired.enabled = false;
    }
}

fn desire_mode(head: &mut Head) {
    if !head.desired.enabled {
        return;
    }

    let optimal = optimal_mode(head.usable_modes(), head.max_preferred_refresh).map(|m| m.id);
    match optimal {
        Some(mode) => head.desired.mode = Some(mode),
        None => {
            if !head.warned_no_mode {
                report_no_mode(head);
                head.warned_no_mode = true;
            }
            head.desired.enabled = false;
        }
    }
}

fn desire_scale(head: &mut Head, config: &Config) {
    if !head.desired.enabled {
        return;
    }

    if let Some(user_scale) = config.scale.iter().find(|s| head.matches(&s.name_desc)) {
        head.desired.scale = Scale::from_f64(user_scale.scale);
        return;
    }

    head.desired.scale = if config.auto_scale {
        auto_scale(head, head.desired_mode())
    } else {
        Scale::ONE
    };
}

fn desire_transform(head: &mut Head, config: &Config) {
    if !head.desired.enabled {
        return;
    }

    head.desired.transform = config
        .transform
        .iter()
        .find(|t| head.matches(&t.name_desc))
        .map_or(Transform::Normal, |t| t.transform);
}
