pub mod factory;
pub mod model;
pub mod ollama;
pub mod openai;

pub use factory::create_provider;
pub use model::{ModelHandle, SharedModel};
pub use ollama::OllamaProvider;
pub use openai::OpenAICompatProvider;
