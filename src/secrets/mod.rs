//! Environment file parsing and secret handling

mod env_file;
mod value;

pub use env_file::{
    is_sensitive, is_valid_key, SecretEvent, SecretSet, SecretsInjector, SecretsOutcome,
};
pub use value::SecretValue;
