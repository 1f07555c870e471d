pub mod error;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use error::{RenderError, Result};
pub use renderer::{
    Camera, Gpu, HeadlessGpu, ObjectKey, ObjectStates, PickResult, Renderer, RendererStats,
};
pub use settings::RenderSettings;

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    // Set panic hook to get better error messages
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::warn!("Logger already initialized");
    }
}

/// Installs the process logger. Safe to call more than once.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
