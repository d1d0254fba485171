//! Stats module - Descriptive statistics over loaded records

mod descriptor;

pub use descriptor::{Columns, Descriptor, DescriptorError, Summary, TypeAndMode, ValueKind};
