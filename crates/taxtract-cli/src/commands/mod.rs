//! Command implementations.

pub mod audit;
pub mod review;
pub mod run;
pub mod schema;
pub mod show;
pub mod species;

pub use self::audit::execute_audit;
pub use self::review::{execute_confirm, execute_correct};
pub use self::run::execute_run;
pub use self::schema::execute_schema;
pub use self::show::execute_show;
pub use self::species::execute_species;
