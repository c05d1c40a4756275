//! API Module
//!
//! HTTP handlers and routing exposing the cache facade as a REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value under a key
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /mget`, `PUT /mset`, `POST /mdel` - Batched forms
//! - `GET /keys` - List live keys
//! - `GET /ttl/:key` - Remaining TTL of a key
//! - `DELETE /reset` - Clear the store
//! - `GET /stats` - Store statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
