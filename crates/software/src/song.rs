mod clock;
pub use clock::*;

mod scheduler;
pub use scheduler::*;

mod demo;
pub use demo::*;
