pub mod analytics;
pub mod auth;
pub mod batch;
pub mod billing;
pub mod brands;
pub mod export;
pub mod feedback;
pub mod generate;
pub mod health;
pub mod stripe_client;
pub mod stripe_signature;
pub mod stripe_webhook;
pub mod subscriptions;
pub mod templates;
