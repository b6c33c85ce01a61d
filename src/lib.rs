pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::{Config, FetchFailurePolicy};
pub use datasource::{BookingSource, DataSourceError, MockBookingSource, SqliteBookingSource};
pub use db::{init_db, BatchWriter, LedgerError, Repository};
pub use domain::{
    Booking, PlanId, PriceRecord, PropertyId, RoomTypeId, StockRecord, UseDate, Wholesaler,
};
pub use error::AppError;
