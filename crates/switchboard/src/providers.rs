pub mod base;
pub mod openai;
pub mod wire;

#[cfg(test)]
pub mod mock;
