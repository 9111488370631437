pub mod operation_reader;
pub mod status_writer;
