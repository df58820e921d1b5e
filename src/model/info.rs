//! Human readable head reports, emitted through `tracing`.

use tracing::{info, warn};

use super::head::Head;
use super::output_manager::DepartedHead;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadEvent {
    Arrived,
    Delta,
    State,
}

pub fn head_lines(head: &Head, event: HeadEvent) -> Vec<String> {
    let mut lines = Vec::new();

    match event {
        HeadEvent::Arrived => lines.push(format!("{} Arrived:", head.name())),
        HeadEvent::Delta | HeadEvent::State => lines.push(format!("{}:", head.name())),
    }

    if event == HeadEvent::Delta {
        lines.extend(delta_lines(head));
        return lines;
    }

    if let Some(description) = &head.description {
        lines.push("  info:".to_string());
        lines.push(format!("    name:     '{}'", head.name()));
        lines.push(format!("    desc:     '{description}'"));
    }
    if head.width_mm > 0 && head.height_mm > 0 {
        lines.push(format!("    width:    {}mm", head.width_mm));
        lines.push(format!("    height:   {}mm", head.height_mm));
    }
    if let Some(make) = &head.make {
        lines.push(format!("    make:     {make}"));
    }
    if let Some(model) = &head.model {
        lines.push(format!("    model:    {model}"));
    }
    if let Some(serial) = &head.serial_number {
        lines.push(format!("    serial:   {serial}"));
    }

    if event == HeadEvent::Arrived || event == HeadEvent::State {
        if !head.modes().is_empty() {
            lines.push("    modes:".to_string());
            for mode in head.modes() {
                let failed = if head.modes_failed.contains(&mode.id) { " (failed)" } else { "" };
                lines.push(format!("      {mode}{failed}"));
            }
        }
        lines.push("  current:".to_string());
        if head.enabled {
            lines.push(format!("    scale:    {}", head.scale));
            lines.push(format!("    position: {},{}", head.x, head.y));
            if let Some(mode) = head.current_mode() {
                lines.push(format!("    mode:     {mode}"));
            }
            lines.push(format!("    transform: {}", head.transform));
        } else {
            lines.push("    (disabled)".to_string());
        }
        if head.lid_closed {
            lines.push("    (lid closed)".to_string());
        }
    }

    lines
}

fn delta_lines(head: &Head) -> Vec<String> {
    let mut lines = Vec::new();

    if head.is_mode_changing() {
        let from = head.current_mode().map(ToString::to_string).unwrap_or_else(|| "?".into());
        let to = head.desired_mode().map(ToString::to_string).unwrap_or_else(|| "?".into());
        lines.push(format!("  mode:     {from} -> {to}"));
        return lines;
    }

    if head.desired.enabled != head.enabled {
        lines.push(format!(
            "  {}",
            if head.desired.enabled { "(enabled)" } else { "(disabled)" }
        ));
    }
    if !head.desired.enabled {
        return lines;
    }
    if head.desired.scale != head.scale {
        lines.push(format!("  scale:    {} -> {}", head.scale, head.desired.scale));
    }
    if head.desired.transform != head.transform {
        lines.push(format!(
            "  transform: {} -> {}",
            head.transform, head.desired.transform
        ));
    }
    if head.desired.x != head.x || head.desired.y != head.y {
        lines.push(format!(
            "  position: {},{} -> {},{}",
            head.x, head.y, head.desired.x, head.desired.y
        ));
    }

    lines
}

pub fn report_head(head: &Head, event: HeadEvent) {
    info!("\n{}", head_lines(head, event).join("\n"));
}

pub fn report_departed(head: &DepartedHead) {
    let name = head.name.as_deref().unwrap_or("???");
    match &head.description {
        Some(desc) => info!("\n{name} Departed:\n    name:     '{name}'\n    desc:     '{desc}'"),
        None => info!("\n{name} Departed"),
    }
}

pub fn report_no_mode(head: &Head) {
    warn!("\nNo mode for {}, disabling.", head.name());
    warn!("\n{}", head_lines(head, HeadEvent::State).join("\n"));
}
