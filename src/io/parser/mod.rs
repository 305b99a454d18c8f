pub mod family_importer;
pub mod newick_parser;
pub mod query_importer;
pub mod tabular;
