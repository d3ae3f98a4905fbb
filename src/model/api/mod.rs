pub mod admin;
pub mod candidate;
pub mod election;
pub mod pagination;
pub mod vote;
pub mod voter;
