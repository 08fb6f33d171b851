mod suspend;

pub use suspend::Suspend;
