/*
 * Responsibility
 * - request-scoped state handed to handlers (principal, correlation id)
 */
mod correlation_id;
mod principal;

pub use correlation_id::CorrelationId;
pub use principal::Principal;
