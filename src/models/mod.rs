pub mod registration;
pub mod session;
pub mod ticket;
pub mod user;

pub use registration::{Registration, RegistrationsConfig};
pub use session::{AuthSession, PasswordResetRequest, VerificationSession};
pub use ticket::Ticket;
pub use user::User;
