use crate::db::query::{ListQuery, Page};
use crate::db::{Store, UnitOfWork};
use crate::error::Result;
use crate::models::{
    accessible_product::{AccessibleProduct, AccessibleProductColumn},
    user::User,
};
use crate::services::card_lifecycle::owner_scope;

/// Lists entitlements; clients only see their own.
pub async fn list_accessible_products(
    store: &dyn Store,
    actor: &User,
    query: ListQuery<AccessibleProductColumn>,
) -> Result<Page<AccessibleProduct>> {
    let query = match owner_scope(actor) {
        Some(owner) => query.scoped(AccessibleProductColumn::UserId, owner),
        None => query,
    };
    let mut uow = store.begin().await?;
    uow.list_accessible_products(&query).await
}
