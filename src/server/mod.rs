//! s3filer HTTP API
//!
//! JSON endpoints behind the file-manager UI: list, exists, upload, delete,
//! rename and download links. Each endpoint maps onto one [`Core`] operation.

mod routes;
mod server;

pub use routes::{parse_query, ApiRoute};
pub use server::{ApiResponse, ApiServer};

use anyhow::Result;
use crate::core::Core;

/// Run the API server with the given core and listen address
pub async fn run_server(core: &Core, listen: &str) -> Result<()> {
    let server = ApiServer::new(core.clone(), listen.to_string());
    server.run().await
}
