// Public modules
pub mod auth_user;
pub mod part;
pub mod protocol_record;
pub mod session;
pub mod turn;

// Re-exports
pub use auth_user::{AuthUser, LoginResponse};
pub use part::{Part, TextPart, ToolCallPart, ToolReturnPart, UnknownPart};
pub use protocol_record::ProtocolRecord;
pub use session::{DEFAULT_AGENT_NAME, NewSession, Session};
pub use turn::{Role, Turn};
