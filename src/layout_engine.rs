pub mod calc;
pub mod desire;

pub use calc::{
    Placement, auto_scale, dpi, layout_dimensions, optimal_mode, order_heads, position_heads,
};
pub use desire::desire;
