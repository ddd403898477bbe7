//! Postgres-backed store. One unit of work is one database transaction.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::query::{ListQuery, Page};
use crate::db::store::{Store, UnitOfWork};
use crate::error::Result;
use crate::models::{
    accessible_product::{AccessibleProduct, AccessibleProductColumn},
    brand::{Brand, BrandColumn, CreateBrandData},
    card::{Card, CardColumn, CreateCardData},
    product::{CreateProductData, Product, ProductColumn},
    user::{CreateUserData, User, UserColumn},
    user_session::{CreateSessionData, UserSession},
};
use crate::services::code_generator::{TokenField, TokenRegistry};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TokenRegistry for PgUnitOfWork {
    async fn token_exists(&mut self, field: TokenField, token: &str) -> Result<bool> {
        let exists = match field {
            TokenField::ActivationCode => Card::activation_code_exists(&mut self.tx, token).await?,
            TokenField::SessionToken => UserSession::token_exists(&mut self.tx, token).await?,
        };
        Ok(exists)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn insert_user(&mut self, data: &CreateUserData) -> Result<User> {
        Ok(User::create(&mut self.tx, data).await?)
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>> {
        Ok(User::find_by_id(&mut self.tx, id).await?)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        Ok(User::find_by_email(&mut self.tx, email).await?)
    }

    async fn list_users(&mut self, query: &ListQuery<UserColumn>) -> Result<Page<User>> {
        Ok(User::list(&mut self.tx, query).await?)
    }

    async fn insert_session(&mut self, data: &CreateSessionData) -> Result<UserSession> {
        Ok(UserSession::create(&mut self.tx, data).await?)
    }

    async fn find_session(&mut self, token: &str) -> Result<Option<UserSession>> {
        Ok(UserSession::find_by_token(&mut self.tx, token).await?)
    }

    async fn delete_session(&mut self, id: Uuid) -> Result<()> {
        Ok(UserSession::soft_delete(&mut self.tx, id).await?)
    }

    async fn insert_brand(&mut self, data: &CreateBrandData) -> Result<Brand> {
        Ok(Brand::create(&mut self.tx, data).await?)
    }

    async fn find_brand(&mut self, id: Uuid) -> Result<Option<Brand>> {
        Ok(Brand::find_by_id(&mut self.tx, id).await?)
    }

    async fn save_brand(&mut self, brand: &Brand) -> Result<Brand> {
        Ok(Brand::save(&mut self.tx, brand).await?)
    }

    async fn soft_delete_brand(&mut self, id: Uuid) -> Result<()> {
        Ok(Brand::soft_delete(&mut self.tx, id).await?)
    }

    async fn list_brands(&mut self, query: &ListQuery<BrandColumn>) -> Result<Page<Brand>> {
        Ok(Brand::list(&mut self.tx, query).await?)
    }

    async fn insert_product(&mut self, data: &CreateProductData) -> Result<Product> {
        Ok(Product::create(&mut self.tx, data).await?)
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>> {
        Ok(Product::find_by_id(&mut self.tx, id).await?)
    }

    async fn save_product(&mut self, product: &Product) -> Result<Product> {
        Ok(Product::save(&mut self.tx, product).await?)
    }

    async fn soft_delete_product(&mut self, id: Uuid) -> Result<()> {
        Ok(Product::soft_delete(&mut self.tx, id).await?)
    }

    async fn list_products(&mut self, query: &ListQuery<ProductColumn>) -> Result<Page<Product>> {
        Ok(Product::list(&mut self.tx, query).await?)
    }

    async fn insert_card(&mut self, data: &CreateCardData) -> Result<Card> {
        Ok(Card::create(&mut self.tx, data).await?)
    }

    async fn find_card(&mut self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Card>> {
        Ok(Card::find_by_id(&mut self.tx, id, owner).await?)
    }

    async fn lock_card(&mut self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Card>> {
        Ok(Card::lock_by_id(&mut self.tx, id, owner).await?)
    }

    async fn live_card_exists(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<bool> {
        Ok(Card::live_exists(&mut self.tx, user_id, product_id, except).await?)
    }

    async fn save_card(&mut self, card: &Card) -> Result<Card> {
        Ok(Card::save(&mut self.tx, card).await?)
    }

    async fn soft_delete_card(&mut self, id: Uuid) -> Result<Card> {
        Ok(Card::soft_delete(&mut self.tx, id).await?)
    }

    async fn list_cards(&mut self, query: &ListQuery<CardColumn>) -> Result<Page<Card>> {
        Ok(Card::list(&mut self.tx, query).await?)
    }

    async fn insert_inactive_accessible_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<AccessibleProduct> {
        Ok(AccessibleProduct::create_inactive(&mut self.tx, user_id, product_id).await?)
    }

    async fn activate_accessible_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<AccessibleProduct>> {
        Ok(AccessibleProduct::activate(&mut self.tx, user_id, product_id).await?)
    }

    async fn list_accessible_products(
        &mut self,
        query: &ListQuery<AccessibleProductColumn>,
    ) -> Result<Page<AccessibleProduct>> {
        Ok(AccessibleProduct::list(&mut self.tx, query).await?)
    }
}
