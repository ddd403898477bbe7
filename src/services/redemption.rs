//! Redeeming an approved card activates the owner's entitlement to its
//! product.

use ring::constant_time;
use uuid::Uuid;

use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{accessible_product::AccessibleProduct, card::CardState, user::User};

/// Secrets presented by the card holder
#[derive(Debug, Clone, Default)]
pub struct RedeemRequest {
    pub activation_code: Option<String>,
    pub pin_code: Option<String>,
}

#[allow(deprecated)]
fn secrets_match(expected: &str, presented: &str) -> bool {
    constant_time::verify_slices_are_equal(expected.as_bytes(), presented.as_bytes()).is_ok()
}

/// Activates the caller's entitlement for the product of `card_id`.
///
/// Checks run in a fixed order and the first failure wins: card approved,
/// activation code, then PIN (a card without a PIN accepts any). The final
/// flip only succeeds while the entitlement is still inactive, so redeeming
/// twice fails with `not_found`.
#[tracing::instrument(skip(store, actor, request), fields(user_id = %actor.id))]
pub async fn redeem(
    store: &dyn Store,
    actor: &User,
    card_id: Uuid,
    request: RedeemRequest,
) -> Result<AccessibleProduct> {
    if !actor.role.can_own_cards() {
        return Err(AppError::Forbidden);
    }

    let presented_code = request
        .activation_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(AppError::ParameterMissing("activation_code"))?;

    let mut uow = store.begin().await?;
    let card = uow
        .find_card(card_id, Some(actor.id))
        .await?
        .ok_or(AppError::NotFound { resource: "card" })?;

    if card.state != CardState::Approved {
        tracing::warn!(state = %card.state, "Redemption of unapproved card");
        return Err(AppError::InvalidState {
            resource: "card",
            state: card.state.to_string(),
        });
    }

    let code_ok = card
        .activation_code
        .as_deref()
        .is_some_and(|expected| secrets_match(expected, presented_code));
    if !code_ok {
        tracing::warn!("Activation code mismatch");
        return Err(AppError::InvalidActivationCode);
    }

    if let Some(expected_pin) = card.pin_code.as_deref() {
        let presented_pin = request.pin_code.as_deref().unwrap_or_default();
        if !secrets_match(expected_pin, presented_pin) {
            tracing::warn!("PIN mismatch");
            return Err(AppError::InvalidPinCode);
        }
    }

    let entitlement = uow
        .activate_accessible_product(actor.id, card.product_id)
        .await?
        .ok_or(AppError::NotFound {
            resource: "accessible_product",
        })?;
    uow.commit().await?;

    tracing::info!(product_id = %card.product_id, "Entitlement activated");
    Ok(entitlement)
}
