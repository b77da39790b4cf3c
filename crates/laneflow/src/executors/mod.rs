//! Production units of work for the two lanes.

mod qa;
mod video;

pub use qa::QaExecutor;
pub use video::VideoExecutor;
