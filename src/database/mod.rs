/// Database layer
///
/// A narrow repository interface over a single sqlite connection. All
/// query modules hang methods off the `Database` wrapper defined in
/// `connection`.
mod alerts;
mod connection;
mod hydrants;
mod logs;
mod weather;

pub use connection::Database;
pub use logs::LogFilter;
