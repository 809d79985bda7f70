//! REST Mock Server
//!
//! Serves canned HTTP responses for declared request mappings. Useful as a
//! stand-in backend during development and testing.
//!
//! # Features
//!
//! - **Request Matching**: Match by method, path (case-insensitive), and required headers
//! - **Duplicate Detection**: Equivalent declarations are rejected at registration
//! - **First Match Wins**: Overlapping mappings resolve in registration order
//! - **Persistence**: Keep mappings in memory or in a SQLite file across restarts
//! - **Fixture Trees**: Load one endpoint per directory from `api.yml` files
//! - **Interactive Entry**: Add mappings from the console before serving
//!
//! # Example Configuration
//!
//! ```yaml
//! mappings:
//!   - method: GET
//!     path: /hello
//!     headers:
//!       Accept: [application/json]
//!     response:
//!       status: 200
//!       body:
//!         type: json
//!         content:
//!           message: "Hello, World!"
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod fixtures;
pub mod mapper;
pub mod mapping;
pub mod normalize;
pub mod server;
pub mod store;

pub use config::MockServerConfig;
pub use error::{MappingError, StoreError};
pub use mapper::Mapper;
pub use mapping::{IncomingRequest, RequestMapping, ResponseData};
pub use store::MappingStore;
