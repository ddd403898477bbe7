//! Shared fixtures for service and router tests.

use std::sync::Arc;

use ring::rand::SystemRandom;
use uuid::Uuid;

use crate::config::MIN_PASSWORD_COST;
use crate::db::memory::MemoryStore;
use crate::db::{Store, UnitOfWork};
use crate::models::{
    brand::{Brand, CreateBrandData},
    product::{CreateProductData, Product},
    user::{CreateUserData, Role, User},
    RecordState,
};
use crate::services::code_generator::CodeGenerator;

pub const PASSWORD: &str = "correct horse battery";

pub struct Fixture {
    pub store: MemoryStore,
    pub generator: CodeGenerator,
    pub admin: User,
    pub client: User,
    pub brand: Brand,
    pub product: Product,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_generator(CodeGenerator::new(Arc::new(SystemRandom::new()), 8, 16, 10)).await
    }

    pub async fn with_generator(generator: CodeGenerator) -> Self {
        let store = MemoryStore::new();
        let admin = insert_user(&store, "admin@example.com", Role::Admin).await;
        let client = insert_user(&store, "client@example.com", Role::Client).await;

        let mut uow = store.begin().await.unwrap();
        let brand = uow
            .insert_brand(&CreateBrandData {
                name: "Acme".to_string(),
                description: None,
                country: Some("JP".to_string()),
                website_url: None,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let product = insert_product(&store, brand.id, "Gift 50", RecordState::Active).await;

        Self {
            store,
            generator,
            admin,
            client,
            brand,
            product,
        }
    }

    pub async fn add_client(&self, email: &str) -> User {
        insert_user(&self.store, email, Role::Client).await
    }

    pub async fn add_product(&self, name: &str, state: RecordState) -> Product {
        insert_product(&self.store, self.brand.id, name, state).await
    }
}

async fn insert_user(store: &MemoryStore, email: &str, role: Role) -> User {
    let password_hash = bcrypt::hash(PASSWORD, MIN_PASSWORD_COST).unwrap();
    let mut uow = store.begin().await.unwrap();
    let user = uow
        .insert_user(&CreateUserData {
            name: None,
            email: email.to_string(),
            password_hash,
            role,
        })
        .await
        .unwrap();
    uow.commit().await.unwrap();
    user
}

async fn insert_product(
    store: &MemoryStore,
    brand_id: Uuid,
    name: &str,
    state: RecordState,
) -> Product {
    let mut uow = store.begin().await.unwrap();
    let product = uow
        .insert_product(&CreateProductData {
            brand_id,
            name: name.to_string(),
            state,
            description: None,
            price_cents: 5000,
        })
        .await
        .unwrap();
    uow.commit().await.unwrap();
    product
}
