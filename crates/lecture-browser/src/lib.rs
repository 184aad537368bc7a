pub mod auth;
pub mod diagnostics;
pub mod discovery;
pub mod driver;

pub use auth::login;
pub use diagnostics::{DebugConfig, Diagnostics};
pub use discovery::{find_system_chromium, is_docker, resolve_executable};
pub use driver::{ChromeDriver, ChromeElement, LaunchOptions};
