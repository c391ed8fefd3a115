// Modul domain untuk Messenger Client
pub mod conversation;
pub mod message;
pub mod profile;
pub mod request;
pub mod session;

// Export publik
pub use conversation::*;
pub use message::*;
pub use profile::*;
pub use request::*;
pub use session::*;
