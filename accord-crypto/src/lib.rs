pub mod canonical;
pub mod hash;
pub mod keys;
