pub mod events;
pub mod failures;
pub mod health;
