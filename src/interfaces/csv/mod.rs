pub mod entity_reader;
pub mod operation_reader;
pub mod report_writer;
