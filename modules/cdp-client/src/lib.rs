pub mod browser;
pub mod connection;
pub mod error;
pub mod page;

pub use browser::{Browser, BrowserContext, LaunchOptions};
pub use connection::{Connection, Event};
pub use error::{CdpError, Result};
pub use page::{Page, ResourceType, WaitUntil};
