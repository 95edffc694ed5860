pub mod session;
pub mod status;

pub use session::SessionPhase;
pub use status::ConnectionStatus;
