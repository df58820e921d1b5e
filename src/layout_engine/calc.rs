//! Pure geometry and mode selection.

use crate::common::config::{Align, Arrange};
use crate::model::{Head, HeadId, Mode, Scale, Transform};

/// Average of horizontal and vertical DPI, or 0 when the physical size is unknown.
pub fn dpi(head: &Head, mode: &Mode) -> f64 {
    if head.width_mm <= 0 || head.height_mm <= 0 {
        return 0.0;
    }

    let horizontal = mode.width as f64 / head.width_mm as f64 * 25.4;
    let vertical = mode.height as f64 / head.height_mm as f64 * 25.4;
    (horizontal + vertical) / 2.0
}

/// DPI rounded to the nearest 12, with 96 DPI mapping to 1.0.
pub fn auto_scale(head: &Head, mode: Option<&Mode>) -> Scale {
    let Some(mode) = mode else {
        return Scale::ONE;
    };

    let dpi = dpi(head, mode);
    if dpi == 0.0 {
        return Scale::ONE;
    }

    let quantized = (dpi / 12.0 + 0.5) as i64 * 12;
    if quantized == 0 {
        return Scale::ONE;
    }

    Scale::from_raw(i32::try_from(256 * quantized / 96).unwrap_or(i32::MAX))
}

/// The preferred mode when there is one, otherwise the largest then fastest.
///
/// With `max_preferred_refresh` the fastest mode sharing the preferred
/// resolution replaces the preferred mode.
pub fn optimal_mode<'a>(
    modes: impl IntoIterator<Item = &'a Mode>,
    max_preferred_refresh: bool,
) -> Option<&'a Mode> {
    let modes: Vec<&Mode> = modes.into_iter().collect();

    let Some(preferred) = modes.iter().copied().find(|m| m.preferred) else {
        return modes
            .iter()
            .copied()
            .max_by_key(|m| (m.area(), m.refresh_mhz, m.width, std::cmp::Reverse(m.id)));
    };

    if !max_preferred_refresh {
        return Some(preferred);
    }

    modes
        .iter()
        .copied()
        .filter(|m| m.same_resolution(preferred))
        .max_by_key(|m| (m.refresh_mhz, m.preferred, std::cmp::Reverse(m.id)))
}

/// Logical size of `mode` once rotated by `transform` and divided by `scale`.
pub fn layout_dimensions(mode: &Mode, transform: Transform, scale: Scale) -> (i32, i32) {
    if scale.raw() <= 0 {
        return (mode.width, mode.height);
    }

    let (width, height) = if transform.is_rotated() {
        (mode.height, mode.width)
    } else {
        (mode.width, mode.height)
    };

    let scaled = |v: i32| (v as f64 * 256.0 / scale.raw() as f64 + 0.5) as i32;
    (scaled(width), scaled(height))
}

/// Heads matching `order` first, in rule order, then the rest in discovery order.
pub fn order_heads<'a>(order: &[String], heads: &'a [Head]) -> Vec<&'a Head> {
    let mut remaining: Vec<&Head> = heads.iter().collect();
    let mut ordered = Vec::with_capacity(heads.len());

    for pattern in order {
        let (matched, rest): (Vec<&Head>, Vec<&Head>) =
            remaining.into_iter().partition(|head| head.matches(pattern));
        ordered.extend(matched);
        remaining = rest;
    }

    ordered.extend(remaining);
    ordered
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub head: HeadId,
    pub x: i32,
    pub y: i32,
}

fn is_placed(head: &Head) -> bool { head.desired.enabled && head.desired.mode.is_some() }

/// Lays the heads out one after another from the origin, using their desired dimensions.
pub fn position_heads(ordered: &[&Head], arrange: Arrange, align: Align) -> Vec<Placement> {
    let placed = || ordered.iter().copied().filter(|h| is_placed(h));

    let tallest = placed().map(|h| h.desired.height).max().unwrap_or(0);
    let widest = placed().map(|h| h.desired.width).max().unwrap_or(0);

    let mut cursor = 0;
    let mut placements = Vec::new();

    for head in placed() {
        let (width, height) = (head.desired.width, head.desired.height);
        let (x, y) = match arrange {
            Arrange::Row => {
                let y = match align {
                    Align::Bottom => tallest - height,
                    Align::Middle => (tallest - height) / 2,
                    _ => 0,
                };
                let x = cursor;
                cursor += width;
                (x, y)
            }
            Arrange::Column => {
                let x = match align {
                    Align::Right => widest - width,
                    Align::Middle => (widest - width) / 2,
                    _ => 0,
                };
                let y = cursor;
                cursor += height;
                (x, y)
            }
        };
        placements.push(Placement { head: head.id, x, y });
    }

    placements
}
