pub mod render;

pub use render::{load_font, FrameStats, SkiaRenderer};
