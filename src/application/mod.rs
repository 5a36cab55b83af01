pub mod ingest;
pub mod recovery;
