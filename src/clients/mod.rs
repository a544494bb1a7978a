pub mod gemini_client;
pub mod google_calendar_client;
pub mod ollama_client;
