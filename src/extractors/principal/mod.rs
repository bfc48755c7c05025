/*!
 * Authenticated principal
 *
 * Responsibility:
 * - the principal type (types)
 * - the axum extractor for handlers (core)
 */

mod core;
mod types;

pub use types::Principal;
