pub mod driver;
pub mod error;
pub mod report;
pub mod runner;
pub mod session;
pub mod utils;

// Re-export common items
pub use driver::list_devices;
pub use error::{HarnessError, Result};
pub use runner::{run_suite, SuiteContext, SuiteSummary};
pub use session::SessionManager;
