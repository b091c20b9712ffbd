pub mod broker;
pub mod search;
pub mod worker;
