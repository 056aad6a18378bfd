pub mod slots;
pub mod token;
pub mod token_cache;
