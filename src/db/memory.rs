//! In-memory store for service and router tests.
//!
//! A unit of work holds the store-wide lock for its whole lifetime and edits a
//! private copy of the tables, so units are fully serialized and a dropped unit
//! leaves no trace. Unique and foreign-key rules mirror the migrations and fail
//! with the same errors the Postgres store maps them to.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::db::query::{ListQuery, Page};
use crate::db::store::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{
    accessible_product::{AccessibleProduct, AccessibleProductColumn, EntitlementState},
    brand::{Brand, BrandColumn, CreateBrandData},
    card::{Card, CardColumn, CardState, CreateCardData},
    product::{CreateProductData, Product, ProductColumn},
    user::{CreateUserData, User, UserColumn},
    user_session::{CreateSessionData, UserSession},
    RecordState,
};
use crate::services::code_generator::{TokenField, TokenRegistry};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<UserSession>,
    brands: Vec<Brand>,
    products: Vec<Product>,
    cards: Vec<Card>,
    accessible_products: Vec<AccessibleProduct>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    units_begun: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed cards, soft-deleted ones included.
    pub async fn all_cards(&self) -> Vec<Card> {
        self.tables.lock().await.cards.clone()
    }

    /// Committed sessions, logged-out ones included.
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Number of units of work opened so far.
    pub fn units_begun(&self) -> usize {
        self.units_begun.load(Ordering::SeqCst)
    }

    /// Committed entitlements.
    pub async fn all_accessible_products(&self) -> Vec<AccessibleProduct> {
        self.tables.lock().await.accessible_products.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.tables.clone().lock_owned().await;
        self.units_begun.fetch_add(1, Ordering::SeqCst);
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn duplicate(resource: &'static str, field: &'static str) -> AppError {
    AppError::Duplicate { resource, field }
}

/// What `fetch_one` reports when an UPDATE ... RETURNING matches nothing.
fn missing_row() -> AppError {
    AppError::Database(sqlx::Error::RowNotFound)
}

#[async_trait]
impl TokenRegistry for MemoryUnitOfWork {
    async fn token_exists(&mut self, field: TokenField, token: &str) -> Result<bool> {
        let exists = match field {
            TokenField::ActivationCode => self
                .working
                .cards
                .iter()
                .any(|c| c.activation_code.as_deref() == Some(token)),
            TokenField::SessionToken => self
                .working
                .sessions
                .iter()
                .any(|s| s.session_token == token),
        };
        Ok(exists)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn insert_user(&mut self, data: &CreateUserData) -> Result<User> {
        if self
            .working
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&data.email))
        {
            return Err(duplicate("user", "email"));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            email: data.email.clone(),
            password_hash: data.password_hash.clone(),
            role: data.role,
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        Ok(self
            .working
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&mut self, query: &ListQuery<UserColumn>) -> Result<Page<User>> {
        Ok(query.apply(self.working.users.iter().cloned()))
    }

    async fn insert_session(&mut self, data: &CreateSessionData) -> Result<UserSession> {
        if !self.working.users.iter().any(|u| u.id == data.user_id) {
            return Err(AppError::Validation("user does not exist".to_string()));
        }
        if self
            .working
            .sessions
            .iter()
            .any(|s| s.session_token == data.session_token)
        {
            return Err(duplicate("user_session", "session_token"));
        }
        let now = Utc::now();
        let session = UserSession {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            session_token: data.session_token.clone(),
            login_ip: data.login_ip.clone(),
            browser: data.browser.clone(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&mut self, token: &str) -> Result<Option<UserSession>> {
        Ok(self
            .working
            .sessions
            .iter()
            .find(|s| s.session_token == token && s.deleted_at.is_none())
            .cloned())
    }

    async fn delete_session(&mut self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        if let Some(session) = self
            .working
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.deleted_at.is_none())
        {
            session.deleted_at = Some(now);
            session.updated_at = now;
        }
        Ok(())
    }

    async fn insert_brand(&mut self, data: &CreateBrandData) -> Result<Brand> {
        if self
            .working
            .brands
            .iter()
            .any(|b| b.deleted_at.is_none() && b.name.eq_ignore_ascii_case(&data.name))
        {
            return Err(duplicate("brand", "name"));
        }
        let now = Utc::now();
        let brand = Brand {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            state: RecordState::Active,
            description: data.description.clone(),
            country: data.country.clone(),
            website_url: data.website_url.clone(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.brands.push(brand.clone());
        Ok(brand)
    }

    async fn find_brand(&mut self, id: Uuid) -> Result<Option<Brand>> {
        Ok(self
            .working
            .brands
            .iter()
            .find(|b| b.id == id && b.deleted_at.is_none())
            .cloned())
    }

    async fn save_brand(&mut self, brand: &Brand) -> Result<Brand> {
        if self.working.brands.iter().any(|b| {
            b.id != brand.id && b.deleted_at.is_none() && b.name.eq_ignore_ascii_case(&brand.name)
        }) {
            return Err(duplicate("brand", "name"));
        }
        let stored = self
            .working
            .brands
            .iter_mut()
            .find(|b| b.id == brand.id && b.deleted_at.is_none())
            .ok_or_else(missing_row)?;
        stored.name = brand.name.clone();
        stored.state = brand.state;
        stored.description = brand.description.clone();
        stored.country = brand.country.clone();
        stored.website_url = brand.website_url.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn soft_delete_brand(&mut self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        for product in self
            .working
            .products
            .iter_mut()
            .filter(|p| p.brand_id == id && p.deleted_at.is_none())
        {
            product.deleted_at = Some(now);
            product.updated_at = now;
        }
        if let Some(brand) = self
            .working
            .brands
            .iter_mut()
            .find(|b| b.id == id && b.deleted_at.is_none())
        {
            brand.deleted_at = Some(now);
            brand.updated_at = now;
        }
        Ok(())
    }

    async fn list_brands(&mut self, query: &ListQuery<BrandColumn>) -> Result<Page<Brand>> {
        Ok(query.apply(
            self.working
                .brands
                .iter()
                .filter(|b| b.deleted_at.is_none())
                .cloned(),
        ))
    }

    async fn insert_product(&mut self, data: &CreateProductData) -> Result<Product> {
        if !self.working.brands.iter().any(|b| b.id == data.brand_id) {
            return Err(AppError::Validation("brand does not exist".to_string()));
        }
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            brand_id: data.brand_id,
            name: data.name.clone(),
            state: data.state,
            description: data.description.clone(),
            price_cents: data.price_cents,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.products.push(product.clone());
        Ok(product)
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>> {
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.id == id && p.deleted_at.is_none())
            .cloned())
    }

    async fn save_product(&mut self, product: &Product) -> Result<Product> {
        let stored = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product.id && p.deleted_at.is_none())
            .ok_or_else(missing_row)?;
        stored.name = product.name.clone();
        stored.state = product.state;
        stored.description = product.description.clone();
        stored.price_cents = product.price_cents;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn soft_delete_product(&mut self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        if let Some(product) = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_none())
        {
            product.deleted_at = Some(now);
            product.updated_at = now;
        }
        Ok(())
    }

    async fn list_products(&mut self, query: &ListQuery<ProductColumn>) -> Result<Page<Product>> {
        Ok(query.apply(
            self.working
                .products
                .iter()
                .filter(|p| p.deleted_at.is_none())
                .cloned(),
        ))
    }

    async fn insert_card(&mut self, data: &CreateCardData) -> Result<Card> {
        if !self.working.products.iter().any(|p| p.id == data.product_id) {
            return Err(AppError::Validation("product does not exist".to_string()));
        }
        if self.live_card_exists(data.user_id, data.product_id, None).await? {
            return Err(duplicate("card", "product_id"));
        }
        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            product_id: data.product_id,
            state: CardState::Issued,
            activation_code: None,
            pin_code: data.pin_code.clone(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.cards.push(card.clone());
        Ok(card)
    }

    async fn find_card(&mut self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Card>> {
        Ok(self
            .working
            .cards
            .iter()
            .find(|c| {
                c.id == id && c.deleted_at.is_none() && owner.map_or(true, |o| c.user_id == o)
            })
            .cloned())
    }

    async fn lock_card(&mut self, id: Uuid, owner: Option<Uuid>) -> Result<Option<Card>> {
        // Units of work are already serialized by the store lock
        self.find_card(id, owner).await
    }

    async fn live_card_exists(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<bool> {
        Ok(self.working.cards.iter().any(|c| {
            c.user_id == user_id
                && c.product_id == product_id
                && c.deleted_at.is_none()
                && except.map_or(true, |e| c.id != e)
        }))
    }

    async fn save_card(&mut self, card: &Card) -> Result<Card> {
        if let Some(code) = card.activation_code.as_deref() {
            if self
                .working
                .cards
                .iter()
                .any(|c| c.id != card.id && c.activation_code.as_deref() == Some(code))
            {
                return Err(duplicate("card", "activation_code"));
            }
        }
        if self
            .live_card_exists(card.user_id, card.product_id, Some(card.id))
            .await?
        {
            return Err(duplicate("card", "product_id"));
        }
        if card.state == CardState::Approved && card.activation_code.is_none() {
            return Err(AppError::Validation(
                "approved cards require an activation code".to_string(),
            ));
        }

        let stored = self
            .working
            .cards
            .iter_mut()
            .find(|c| c.id == card.id && c.deleted_at.is_none())
            .ok_or_else(missing_row)?;
        stored.product_id = card.product_id;
        stored.state = card.state;
        stored.activation_code = card.activation_code.clone();
        stored.pin_code = card.pin_code.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn soft_delete_card(&mut self, id: Uuid) -> Result<Card> {
        let now = Utc::now();
        let stored = self
            .working
            .cards
            .iter_mut()
            .find(|c| c.id == id && c.deleted_at.is_none())
            .ok_or_else(missing_row)?;
        stored.deleted_at = Some(now);
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn list_cards(&mut self, query: &ListQuery<CardColumn>) -> Result<Page<Card>> {
        Ok(query.apply(
            self.working
                .cards
                .iter()
                .filter(|c| c.deleted_at.is_none())
                .cloned(),
        ))
    }

    async fn insert_inactive_accessible_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<AccessibleProduct> {
        if self
            .working
            .accessible_products
            .iter()
            .any(|a| a.user_id == user_id && a.product_id == product_id)
        {
            return Err(duplicate("accessible_product", "product_id"));
        }
        let now = Utc::now();
        let entitlement = AccessibleProduct {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            state: EntitlementState::Inactive,
            created_at: now,
            updated_at: now,
        };
        self.working.accessible_products.push(entitlement.clone());
        Ok(entitlement)
    }

    async fn activate_accessible_product(
        &mut self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<AccessibleProduct>> {
        let found = self.working.accessible_products.iter_mut().find(|a| {
            a.user_id == user_id && a.product_id == product_id && a.state == EntitlementState::Inactive
        });
        Ok(found.map(|entitlement| {
            entitlement.state = EntitlementState::Active;
            entitlement.updated_at = Utc::now();
            entitlement.clone()
        }))
    }

    async fn list_accessible_products(
        &mut self,
        query: &ListQuery<AccessibleProductColumn>,
    ) -> Result<Page<AccessibleProduct>> {
        Ok(query.apply(self.working.accessible_products.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_product(store: &MemoryStore) -> Product {
        let mut uow = store.begin().await.unwrap();
        let brand = uow
            .insert_brand(&CreateBrandData {
                name: "Acme".to_string(),
                description: None,
                country: None,
                website_url: None,
            })
            .await
            .unwrap();
        let product = uow
            .insert_product(&CreateProductData {
                brand_id: brand.id,
                name: "Gift 50".to_string(),
                state: RecordState::Active,
                description: None,
                price_cents: 5000,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_card(&CreateCardData {
                user_id: Uuid::new_v4(),
                product_id: product.id,
                pin_code: None,
            })
            .await
            .unwrap();
        }

        assert!(store.all_cards().await.is_empty());
    }

    #[tokio::test]
    async fn test_live_pair_is_unique() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;
        let user_id = Uuid::new_v4();
        let data = CreateCardData {
            user_id,
            product_id: product.id,
            pin_code: None,
        };

        let mut uow = store.begin().await.unwrap();
        let card = uow.insert_card(&data).await.unwrap();
        let err = uow.insert_card(&data).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Duplicate {
                resource: "card",
                field: "product_id"
            }
        ));

        // A soft-deleted card frees the pair
        uow.soft_delete_card(card.id).await.unwrap();
        uow.insert_card(&data).await.unwrap();
    }

    #[tokio::test]
    async fn test_deleting_brand_hides_its_products_and_frees_name() {
        let store = MemoryStore::new();
        let product = seed_product(&store).await;

        let mut uow = store.begin().await.unwrap();
        uow.soft_delete_brand(product.brand_id).await.unwrap();
        assert!(uow.find_brand(product.brand_id).await.unwrap().is_none());
        assert!(uow.find_product(product.id).await.unwrap().is_none());
        assert_eq!(uow.list_products(&ListQuery::default()).await.unwrap().total_count, 0);

        uow.insert_brand(&CreateBrandData {
            name: "ACME".to_string(),
            description: None,
            country: None,
            website_url: None,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_entitlement_activates_once() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        let mut uow = store.begin().await.unwrap();
        uow.insert_inactive_accessible_product(user_id, product_id)
            .await
            .unwrap();
        assert!(uow
            .insert_inactive_accessible_product(user_id, product_id)
            .await
            .is_err());

        let first = uow.activate_accessible_product(user_id, product_id).await.unwrap();
        let second = uow.activate_accessible_product(user_id, product_id).await.unwrap();
        assert_eq!(first.map(|a| a.state), Some(EntitlementState::Active));
        assert!(second.is_none());
    }
}
