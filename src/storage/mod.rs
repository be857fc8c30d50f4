mod memory;

pub use memory::SubscriptionStore;
