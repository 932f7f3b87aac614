// Library exports for integration tests and embedding.

pub mod dataflow;
