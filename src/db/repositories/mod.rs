mod events;

pub use events::EventTableCounts;
