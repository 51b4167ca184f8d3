pub mod avatar;
pub mod browser;
pub mod compositor;
pub mod llm;
pub mod mail;
pub mod recorder;
