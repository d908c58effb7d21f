//! Terminal stand-in for the browser location.

use checkout_core::{CardOption, Navigator};
use std::sync::Mutex;
use tracing::info;
use url::Url;

/// Tracks a page URL and reports navigations instead of performing them.
///
/// Relative targets such as `/sub/me` are resolved against the current page.
pub struct ConsoleNavigator {
    href: Mutex<String>,
}

impl ConsoleNavigator {
    pub fn at(href: impl Into<String>) -> Self {
        Self {
            href: Mutex::new(href.into()),
        }
    }

    fn resolve(&self, target: &str) -> String {
        Url::parse(&self.current_href())
            .and_then(|base| base.join(target))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| target.to_string())
    }
}

impl Navigator for ConsoleNavigator {
    fn current_href(&self) -> String {
        self.href
            .lock()
            .map(|href| href.clone())
            .unwrap_or_default()
    }

    fn navigate(&self, url: &str) {
        let target = self.resolve(url);
        info!(target = %target, "Navigate");
        println!("→ {}", target);
        if let Ok(mut href) = self.href.lock() {
            *href = target;
        }
    }
}

/// One line of the card list: selection marker, index, brand, masked number and `payId`
pub fn card_line(index: usize, card: &CardOption, selected: bool) -> String {
    let mut line = format!(
        "{} [{}] {}",
        if selected { "*" } else { " " },
        index,
        card.brand.as_deref().unwrap_or("card")
    );
    let label = card.display_label();
    if !label.is_empty() {
        line.push(' ');
        line.push_str(&label);
    }
    if card.details_pending() {
        line.push_str(" (details after first payment)");
    }
    if let Some(ref pay_id) = card.pay_id {
        line.push_str(&format!("  payId={}", pay_id));
    }
    line
}
