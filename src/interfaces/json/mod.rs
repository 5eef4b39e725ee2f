pub mod simulation;
pub mod snapshot_writer;
