mod client;
mod types;

pub use client::{ConnectionTestResult, GeminiClient};
