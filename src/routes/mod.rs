pub mod docs;
pub mod healthz;
