//! services/api/src/adapters/mailer.rs
//!
//! A `MagicLinkMailer` that writes login links to the log instead of sending
//! email. Suitable for development and for deployments where an operator relays
//! links by hand.

use async_trait::async_trait;
use family_photos_core::ports::{MagicLinkMailer, PortResult};
use tracing::info;

#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl MagicLinkMailer for LogMailer {
    async fn send_magic_link(&self, email: &str, link: &str) -> PortResult<()> {
        info!(%email, %link, "Magic login link issued");
        Ok(())
    }
}
