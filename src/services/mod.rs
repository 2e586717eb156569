pub mod call_service;
pub mod conversation_service;
pub mod file_storage;
pub mod message_service;
pub mod notification_service;
pub mod presence_service;
pub mod profile_service;
