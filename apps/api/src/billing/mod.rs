// Billing: Stripe checkout, cancellation and webhooks behind the
// PaymentGateway seam.

pub mod gateway;
pub mod handlers;
pub mod stripe;
pub mod webhook;
