pub mod attempts;
pub mod bank;
pub mod classrooms;
pub mod core;
pub mod invites;
pub mod onboarding;
