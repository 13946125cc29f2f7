pub mod claims;
pub mod jwt_helper;

pub use jwt_helper::{create_token, identity_from_token, verify_token};

/// Who is on the other end of a connection, decided once at handshake time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Anonymous,
}

impl Identity {
    pub fn username(&self) -> Option<&str> {
        match self {
            Identity::User(name) => Some(name),
            Identity::Anonymous => None,
        }
    }
}
