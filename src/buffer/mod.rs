//! Windowed record cache, the driver boundary, and the background fetch engine.

pub mod driver;
pub mod engine;
pub mod line;
pub mod screen_buffer;

pub use driver::{Driver, DriverFactory, FetchInstruction, Record};
pub use engine::EngineState;
pub use line::{FACILITIES, LEVELS, Line, MAX_LEVEL};
pub use screen_buffer::{BufferConfig, ObserverId, ScreenBuffer};
