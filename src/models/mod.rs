// Models module - Database entity representations

use serde::{Deserialize, Serialize};

pub mod accessible_product;
pub mod brand;
pub mod card;
pub mod product;
pub mod user;
pub mod user_session;

pub use accessible_product::{AccessibleProduct, AccessibleProductColumn, EntitlementState};
pub use brand::{Brand, BrandColumn};
pub use card::{Card, CardColumn, CardState};
pub use product::{Product, ProductColumn};
pub use user::{Role, User, UserColumn};
pub use user_session::UserSession;

/// Availability of users, brands and products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RecordState {
    Inactive,
    Active,
}

impl RecordState {
    pub const LABELS: &'static [&'static str] = &["inactive", "active"];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordState::Inactive => "inactive",
            RecordState::Active => "active",
        }
    }
}
