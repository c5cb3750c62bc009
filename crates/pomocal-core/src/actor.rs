use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
///
/// Authentication itself lives outside the core; whoever fronts the core
/// (the CLI, a web layer) resolves the user and passes this in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.id == owner_id
    }
}
