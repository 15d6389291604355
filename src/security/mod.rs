//! Security module - Token memory handling and log sanitization

mod access_token;
mod sanitizer;

pub use access_token::AccessToken;
pub use sanitizer::Sanitizer;
