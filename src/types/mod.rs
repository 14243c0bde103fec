//! Public types for the relay API.

mod message;
mod model;
mod response;

pub use message::{Message, Role};
pub use model::{ModelCategory, ModelSummary, ServerVersion};
pub use response::ChatResponse;
