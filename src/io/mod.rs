pub mod export;
/// Value table files.
pub mod table;
