//! Identifier generation for requests and database connections.

use uuid::Uuid;

/// Generates unique identifiers.
pub struct IdGenerator;

impl IdGenerator {
    /// Full UUID used as a request ID.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Short identifier attached to a database connection in logs.
    pub fn connection_id() -> String {
        format!("conn-{}", &Uuid::new_v4().simple().to_string()[..8])
    }
}
