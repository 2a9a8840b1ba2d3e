pub mod motion_box;
pub mod motion_engine;
pub mod motion_pixels;
pub mod pixel;
pub mod pixel_buffer;
pub mod utils;
