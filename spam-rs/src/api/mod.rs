//! HTTP API
//!
//! - `GET /health`
//! - `POST /predict` - JSON `{ "text": ... }`
//! - `POST /predict-image` - multipart `image`
//! - `POST /analyze-all` - multipart `text` and/or `image`

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::ApiServer;
