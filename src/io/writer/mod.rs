pub mod newick_writer;
pub mod table_writer;
