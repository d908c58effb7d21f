//! Registered cards offered as the payment source of a checkout.

use checkout_core::{CardOption, CheckoutResult, SharedBackend};
use tracing::{info, instrument};

/// Card list with a current selection
pub struct CardWallet {
    backend: SharedBackend,
    cards: Vec<CardOption>,
    selected: Option<usize>,
}

impl CardWallet {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            cards: Vec::new(),
            selected: None,
        }
    }

    /// Reload the card list. The previous selection survives when the same
    /// card is still registered; otherwise the first usable card is selected.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> CheckoutResult<&[CardOption]> {
        let previous = self.selected().cloned();
        self.cards = self.backend.list_billing_keys().await?;

        self.selected = previous
            .and_then(|prev| self.cards.iter().position(|c| same_card(c, &prev)))
            .or_else(|| self.cards.iter().position(CardOption::is_usable));

        info!(count = self.cards.len(), "Cards loaded");
        Ok(&self.cards)
    }

    /// Soft-delete a card on the backend, then reload the list
    #[instrument(skip(self, card))]
    pub async fn remove(&mut self, card: &CardOption) -> CheckoutResult<()> {
        self.backend.remove_card(card).await?;
        info!("Card removed");
        self.load().await?;
        Ok(())
    }

    /// Select the card at `index`; unusable cards cannot be selected
    pub fn select(&mut self, index: usize) -> Option<&CardOption> {
        match self.cards.get(index) {
            Some(card) if card.is_usable() => {
                self.selected = Some(index);
                Some(card)
            }
            _ => None,
        }
    }

    pub fn selected(&self) -> Option<&CardOption> {
        self.selected.and_then(|i| self.cards.get(i))
    }

    pub fn cards(&self) -> &[CardOption] {
        &self.cards
    }
}

fn same_card(a: &CardOption, b: &CardOption) -> bool {
    match (&a.pay_id, &b.pay_id) {
        (Some(x), Some(y)) => x == y,
        _ => a.billing_key.is_some() && a.billing_key == b.billing_key,
    }
}
