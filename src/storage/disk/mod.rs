mod disk_scheduler;

pub use disk_scheduler::*;
