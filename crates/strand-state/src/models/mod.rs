//! Concrete record types

pub mod brush_stroke;
pub mod ribbon_point;

pub use brush_stroke::*;
pub use ribbon_point::*;
