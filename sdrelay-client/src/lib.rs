//! sdrelay HTTP clients
//!
//! Two clients live here:
//! - [`WebUiClient`]: calls the local Stable Diffusion WebUI API with
//!   per-operation timeouts and retry-on-5xx
//! - [`QueueClient`]: fetches jobs from and reports outcomes to a
//!   serverless job queue
//!
//! # Example
//!
//! ```no_run
//! use sdrelay_client::{RetryPolicy, WebUiClient};
//! use sdrelay_core::domain::operation::Operation;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sdrelay_client::ClientError> {
//!     let client = WebUiClient::new("http://127.0.0.1:3000/sdapi/v1", RetryPolicy::default());
//!
//!     let loras = client.call(Operation::GetLoras, None).await?;
//!     println!("{}", loras);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod queue;
pub mod retry;
pub mod webui;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use queue::{QueueClient, QueueEndpoints};
pub use retry::RetryPolicy;
pub use webui::{ApiResponse, DEFAULT_BASE_URL, WebUiClient};
