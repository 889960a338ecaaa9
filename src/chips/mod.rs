//! Chip implementations
//!
//! - CPU Chip: six trace columns, the pc transition defect and row semantics
//! - Lookup Chip: fixed 4-bit AND/OR truth table

pub mod cpu;
pub mod lookup;

pub use cpu::{Column, CpuChip, TraceColumns};
pub use lookup::{LookupTable, TableColumns};
