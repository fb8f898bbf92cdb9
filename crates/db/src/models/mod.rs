pub mod donation;
pub mod notification;
pub mod status_history;
pub mod user;

pub use donation::*;
pub use notification::*;
pub use status_history::*;
pub use user::*;
