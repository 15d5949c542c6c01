pub mod conversation;
pub mod dispatcher;
pub mod evaluation;
pub mod handlers;
pub mod prompt;
pub mod report;
pub mod schema;
pub mod tasks;
pub mod tools;
pub mod upload;
