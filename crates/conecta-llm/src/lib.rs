pub mod gemini;
pub mod mock;

pub use gemini::{GeminiProvider, DEFAULT_MODEL};
pub use mock::{MockProvider, MockResponse};
