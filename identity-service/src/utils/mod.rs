pub mod client_ip;
pub mod password;
pub mod secrets;
pub mod validation;

pub use client_ip::ClientIp;
pub use password::{Argon2Hasher, CredentialHasher, Password, PasswordHashString};
pub use secrets::{digest_secret, generate_token, secrets_match};
pub use validation::{InvalidRequest, ValidatedJson, ValidatedQuery};
