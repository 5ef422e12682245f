// Domain records and request/response shapes

pub mod analytics;
pub mod coach;
pub mod device;
pub mod notification;
pub mod pagination;
pub mod punch;
pub mod session;
pub mod user;
pub mod workout;

pub use analytics::*;
pub use coach::*;
pub use device::*;
pub use notification::*;
pub use pagination::*;
pub use punch::*;
pub use session::*;
pub use user::*;
pub use workout::*;
