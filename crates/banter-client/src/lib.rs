//! HTTP implementation of [`banter_core::Transport`].
//!
//! Talks to the chat backend over its JSON API and keeps the login cookie
//! between calls.

mod client;
mod wire;

pub use client::HttpTransport;

use banter_config::Config;
use banter_core::ControllerConfig;

/// Controller settings taken from the `client` section of the config file.
pub fn controller_config(config: &Config) -> ControllerConfig {
    ControllerConfig::default()
        .with_request_timeout(config.client.request_timeout())
        .with_auth_expiry_delay(config.client.auth_expiry_delay())
        .with_new_chat_title(config.client.new_chat_title.clone())
        .with_reconcile_history(config.client.reconcile_history)
}
