pub mod check;
pub mod resolve;
