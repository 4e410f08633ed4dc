pub mod broadcast;
pub mod notify;
pub mod payment;
