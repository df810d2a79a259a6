//! Class identity and ownership scope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one class.
pub type ClassId = Uuid;

/// Who a class belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassScope {
    /// Shared class managed by the institution.
    Institutional,
    /// Private class owned by one instructor.
    Personal { owner_id: String },
}

impl ClassScope {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            Self::Institutional => "institutional",
            Self::Personal { .. } => "personal",
        }
    }

    pub(crate) fn owner_id(&self) -> Option<&str> {
        match self {
            Self::Institutional => None,
            Self::Personal { owner_id } => Some(owner_id.as_str()),
        }
    }
}

/// Opaque class handle passed to every roster and attendance call.
///
/// The scope travels with the id so storage lookups can reject a personal
/// class addressed by someone other than its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub id: ClassId,
    pub scope: ClassScope,
}

impl ClassRef {
    pub fn institutional(id: ClassId) -> Self {
        Self {
            id,
            scope: ClassScope::Institutional,
        }
    }

    pub fn personal(id: ClassId, owner_id: impl Into<String>) -> Self {
        Self {
            id,
            scope: ClassScope::Personal {
                owner_id: owner_id.into(),
            },
        }
    }
}

/// Class read model returned by the roster store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub class_ref: ClassRef,
    pub name: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}
