pub mod sampler;
pub mod source;
