pub mod error;
pub mod facade;
mod manager;
pub mod provider;
pub mod state;

pub use error::SessionError;
pub use facade::{Access, SessionFacade};
pub use provider::SessionProvider;
pub use state::{SessionPhase, SessionSnapshot, SessionState};
