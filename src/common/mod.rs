pub mod bounded;
pub mod constants;
