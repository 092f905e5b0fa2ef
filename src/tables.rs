pub mod common_events;
pub mod convention_registrations;
pub mod conventions;
pub mod games;
pub mod places;
pub mod registrations;
pub mod runs;
pub mod users;
