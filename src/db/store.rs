//! Storage seam for the services.
//!
//! Every request runs inside one [`UnitOfWork`]. Writes become visible only on
//! [`UnitOfWork::commit`]; dropping an uncommitted unit rolls it back.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::query::{ListQuery, Page};
use crate::error::Result;
use crate::models::{
    accessible_product::{AccessibleProduct, AccessibleProductColumn},
    brand::{Brand, BrandColumn, CreateBrandData},
    card::{Card, CardColumn, CreateCardData},
    product::{CreateProductData, Product, ProductColumn},
    user::{CreateUserData, User, UserColumn},
    user_session::{CreateSessionData, UserSession},
};
use crate::services::code_generator::TokenRegistry;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait UnitOfWork: TokenRegistry {
    async fn commit(self: Box<Self>) -> Result<()>;

    // Users and sessions
    async fn insert_user(&mut self, data: &CreateUserData) -> Result<User>;
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>>;
    async fn list_users(&mut self, query: &ListQuery<UserColumn>) -> Result<Page<User>>;
    async fn insert_session(&mut self, data: &CreateSessionData) -> Result<UserSession>;
    async fn find_session(&mut self, token: &str) -> Result<Option<UserSession>>;
    async fn delete_session(&mut self, id: Uuid) -> Result<()>;

    // Catalog
    async fn insert_brand(&mut self, data: &CreateBrandData) -> Result<Brand>;
    async fn find_brand(&mut self, id: Uuid) -> Result<Option<Brand>>;
    async fn save_brand(&mut self, brand: &Brand) -> Result<Brand>;
    /// Soft-deletes the brand and every live product under it.
    async fn soft_delete_brand(&mut self, id: Uuid) -> Result<()>;
    async fn list_brands(&mut self, query: &ListQuery<BrandColumn>) -> Result<Page<Brand>>;
    async fn insert_product(&mut self, data: &CreateProductData) -> Result<Product>;
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>>;
    async fn save_product(&mut self, product: &Product) -> Result<Product>;
    async fn soft_delete_product(&mut self, id: Uuid) -> Result<()>;
    async fn list_products(&mut self, query: &ListQuery<ProductColumn>) -> Result<Page<Product>>;

    // Cards
    async fn insert_card(&mut self, data: &CreateCardData) -> Result<Card>;
    /// A live card, restricted to `owner` when given.
    async fn find_card(&mut self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Card>>;
    /// Like `find_card`, and no other unit of work may modify the card until
    /// this one ends.
    async fn lock_card(&mut self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Card>>;
    async fn live_card_exists(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<bool>;
    async fn save_card(&mut self, card: &Card) -> Result<Card>;
    async fn soft_delete_card(&mut self, id: Uuid) -> Result<Card>;
    async fn list_cards(&mut self, query: &ListQuery<CardColumn>) -> Result<Page<Card>>;

    // Entitlements
    async fn insert_inactive_accessible_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<AccessibleProduct>;
    /// Conditional `inactive -> active` flip; `None` if nothing was inactive.
    async fn activate_accessible_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<AccessibleProduct>>;
    async fn list_accessible_products(
        &mut self,
        query: &ListQuery<AccessibleProductColumn>,
    ) -> Result<Page<AccessibleProduct>>;
}
