mod channel_table;
pub use channel_table::*;

mod engine;
pub use engine::*;

mod hal;
pub use hal::*;

mod opl2;
pub use opl2::*;

mod patch;
pub use patch::*;

mod voice_allocator;
pub use voice_allocator::*;
