//! Card issuance, review and owner-side maintenance.
//!
//! Every operation runs in a single unit of work. Any error drops it
//! uncommitted, so a failed call leaves no partial writes behind.

use uuid::Uuid;

use crate::db::query::{ListQuery, Page};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{
    card::{Card, CardColumn, CardState, CreateCardData},
    user::User,
    RecordState,
};
use crate::services::code_generator::{CodeGenerator, TokenField};

/// Request to issue a card for the calling client
#[derive(Debug, Clone, Default)]
pub struct CreateCardRequest {
    pub product_id: Uuid,
    pub pin_code: Option<String>,
}

/// Owner-side card changes. `None` leaves a field untouched; an empty PIN
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateCardRequest {
    pub product_id: Option<Uuid>,
    pub pin_code: Option<String>,
}

/// Clients only see their own cards; admins see everything.
pub(crate) fn owner_scope(actor: &User) -> Option<Uuid> {
    if actor.role.can_review_cards() {
        None
    } else {
        Some(actor.id)
    }
}

fn require_owner(actor: &User) -> Result<()> {
    if actor.role.can_own_cards() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn require_reviewer(actor: &User) -> Result<()> {
    if actor.role.can_review_cards() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn normalize_pin(pin: Option<String>) -> Option<String> {
    pin.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}

fn invalid_state(card: &Card) -> AppError {
    AppError::InvalidState {
        resource: "card",
        state: card.state.to_string(),
    }
}

/// Issues a new card in `issued` state for the calling client.
#[tracing::instrument(skip(store, actor, request), fields(user_id = %actor.id, product_id = %request.product_id))]
pub async fn create_card(
    store: &dyn Store,
    actor: &User,
    request: CreateCardRequest,
) -> Result<Card> {
    require_owner(actor)?;

    let mut uow = store.begin().await?;

    let product = uow
        .find_product(request.product_id)
        .await?
        .filter(|p| p.state == RecordState::Active)
        .ok_or(AppError::NotFound { resource: "product" })?;

    if uow.live_card_exists(actor.id, product.id, None).await? {
        tracing::warn!("Live card already exists for this product");
        return Err(AppError::Duplicate {
            resource: "card",
            field: "product_id",
        });
    }

    let card = uow
        .insert_card(&CreateCardData {
            user_id: actor.id,
            product_id: product.id,
            pin_code: normalize_pin(request.pin_code),
        })
        .await?;
    uow.commit().await?;

    tracing::info!(card_id = %card.id, "Card issued");
    Ok(card)
}

pub async fn get_card(store: &dyn Store, actor: &User, card_id: Uuid) -> Result<Card> {
    let mut uow = store.begin().await?;
    uow.find_card(card_id, owner_scope(actor))
        .await?
        .ok_or(AppError::NotFound { resource: "card" })
}

/// Changes the product of an issued card, or the PIN of an issued or
/// approved card.
#[tracing::instrument(skip(store, actor, request), fields(user_id = %actor.id))]
pub async fn update_card(
    store: &dyn Store,
    actor: &User,
    card_id: Uuid,
    request: UpdateCardRequest,
) -> Result<Card> {
    require_owner(actor)?;

    let mut uow = store.begin().await?;
    let mut card = uow
        .lock_card(card_id, Some(actor.id))
        .await?
        .ok_or(AppError::NotFound { resource: "card" })?;

    if let Some(product_id) = request.product_id.filter(|id| *id != card.product_id) {
        if card.state != CardState::Issued {
            tracing::warn!(state = %card.state, "Product change refused");
            return Err(invalid_state(&card));
        }
        uow.find_product(product_id)
            .await?
            .filter(|p| p.state == RecordState::Active)
            .ok_or(AppError::NotFound { resource: "product" })?;
        if uow
            .live_card_exists(card.user_id, product_id, Some(card.id))
            .await?
        {
            return Err(AppError::Duplicate {
                resource: "card",
                field: "product_id",
            });
        }
        card.product_id = product_id;
    }

    if let Some(pin) = request.pin_code {
        if card.state == CardState::Rejected {
            tracing::warn!(state = %card.state, "PIN change refused");
            return Err(invalid_state(&card));
        }
        card.pin_code = normalize_pin(Some(pin));
    }

    let card = uow.save_card(&card).await?;
    uow.commit().await?;

    tracing::info!("Card updated");
    Ok(card)
}

/// Soft-deletes an issued card, freeing its (user, product) pair.
#[tracing::instrument(skip(store, actor), fields(user_id = %actor.id))]
pub async fn destroy_card(store: &dyn Store, actor: &User, card_id: Uuid) -> Result<Card> {
    require_owner(actor)?;

    let mut uow = store.begin().await?;
    let card = uow
        .lock_card(card_id, Some(actor.id))
        .await?
        .ok_or(AppError::NotFound { resource: "card" })?;

    if card.state != CardState::Issued {
        tracing::warn!(state = %card.state, "Destroy refused");
        return Err(invalid_state(&card));
    }

    let card = uow.soft_delete_card(card.id).await?;
    uow.commit().await?;

    tracing::info!("Card destroyed");
    Ok(card)
}

/// Approves an issued card.
///
/// In one unit of work the card becomes `approved`, receives an activation
/// code if it has none, and an inactive entitlement is created for its
/// (user, product) pair. If that entitlement already exists nothing is kept.
#[tracing::instrument(skip(store, generator, actor), fields(reviewer_id = %actor.id))]
pub async fn approve_card(
    store: &dyn Store,
    generator: &CodeGenerator,
    actor: &User,
    card_id: Uuid,
) -> Result<Card> {
    require_reviewer(actor)?;

    let mut uow = store.begin().await?;
    let mut card = uow
        .lock_card(card_id, None)
        .await?
        .ok_or(AppError::NotFound { resource: "card" })?;

    if !card.state.can_transition_to(CardState::Approved) {
        tracing::warn!(state = %card.state, "Approval refused");
        return Err(invalid_state(&card));
    }

    card.state = CardState::Approved;
    if card.activation_code.is_none() {
        let code = generator
            .generate(&mut *uow, TokenField::ActivationCode)
            .await?;
        card.activation_code = Some(code);
    }
    let card = uow.save_card(&card).await?;

    uow.insert_inactive_accessible_product(card.user_id, card.product_id)
        .await?;
    uow.commit().await?;

    tracing::info!(user_id = %card.user_id, product_id = %card.product_id, "Card approved");
    Ok(card)
}

/// Rejects an issued card. Admins may reject any card, clients only their own.
#[tracing::instrument(skip(store, actor), fields(actor_id = %actor.id))]
pub async fn reject_card(store: &dyn Store, actor: &User, card_id: Uuid) -> Result<Card> {
    let mut uow = store.begin().await?;
    let mut card = uow
        .lock_card(card_id, owner_scope(actor))
        .await?
        .ok_or(AppError::NotFound { resource: "card" })?;

    if !card.state.can_transition_to(CardState::Rejected) {
        tracing::warn!(state = %card.state, "Rejection refused");
        return Err(invalid_state(&card));
    }

    card.state = CardState::Rejected;
    let card = uow.save_card(&card).await?;
    uow.commit().await?;

    tracing::info!("Card rejected");
    Ok(card)
}

pub async fn list_cards(
    store: &dyn Store,
    actor: &User,
    query: ListQuery<CardColumn>,
) -> Result<Page<Card>> {
    let query = match owner_scope(actor) {
        Some(owner) => query.scoped(CardColumn::UserId, owner),
        None => query,
    };
    let mut uow = store.begin().await?;
    uow.list_cards(&query).await
}
