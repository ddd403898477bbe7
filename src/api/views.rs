use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    card::{Card, CardState},
    user::User,
    user_session::UserSession,
};

/// Card as returned by the API. The activation code and PIN are only
/// revealed once the card is approved.
#[derive(Debug, Serialize)]
pub struct CardView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub state: CardState,
    pub activation_code: Option<String>,
    pub pin_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Card> for CardView {
    fn from(card: Card) -> Self {
        let revealed = card.state == CardState::Approved;
        Self {
            id: card.id,
            user_id: card.user_id,
            product_id: card.product_id,
            state: card.state,
            activation_code: card.activation_code.filter(|_| revealed),
            pin_code: card.pin_code.filter(|_| revealed),
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_token: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(session: UserSession, user: User) -> Self {
        Self {
            session_token: session.session_token,
            user,
            created_at: session.created_at,
        }
    }
}
