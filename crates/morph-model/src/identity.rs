//! Record identity

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Immutable `(type, id)` pair of a node
///
/// Top-level records always carry both; nested models may carry neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModelIdentity {
    /// Type name
    pub model_name: Option<String>,
    /// Identifier
    pub id: Option<String>,
}

impl ModelIdentity {
    /// Identity of a top-level record
    #[inline]
    #[must_use]
    pub fn new(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            id: Some(id.into()),
        }
    }

    /// Identity with optional parts, as carried by nested models
    #[inline]
    #[must_use]
    pub fn partial(model_name: Option<String>, id: Option<String>) -> Self {
        Self { model_name, id }
    }

    /// Whether both type and id are unknown
    #[inline]
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.model_name.is_none() && self.id.is_none()
    }
}

impl Display for ModelIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.model_name.as_deref().unwrap_or("?"),
            self.id.as_deref().unwrap_or("?")
        )
    }
}
