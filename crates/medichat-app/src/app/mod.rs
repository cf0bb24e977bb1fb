pub mod repl;
pub mod stock;

pub use repl::run_repl_mode;
pub use stock::run_stock_export;
