pub mod city;
pub mod json;
pub mod text;

pub use city::{CityDocument, CityNode, NodeKind, ObjectEntry};
