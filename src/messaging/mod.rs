// Transport clients, created once at startup and shared
mod redpanda;
mod webhook;

pub use redpanda::{RedpandaClient, ReservationQueue};
pub use webhook::DeliveryWebhookClient;
