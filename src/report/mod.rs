pub mod csv_export;
pub mod roster;
pub mod stats;
