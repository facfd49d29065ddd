pub mod core_processor;
pub mod mssql_strategy;
pub mod normalizer;
pub mod table_loader;
