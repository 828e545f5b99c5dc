pub mod csv_writer;
pub mod restart;
pub mod summary;
