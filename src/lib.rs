//! 汉语新解 card generator: an LLM proxy route that pulls an SVG card out of
//! the model's reply, and the export pipeline that turns it into a PNG.

pub mod card;
pub mod cli;
pub mod llm;
pub mod preprocessing;
pub mod render;
pub mod server;

#[cfg(test)]
mod testing;
