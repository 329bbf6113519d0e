//! HTTP clients for the demo REST API

pub mod todos;

pub use todos::{PutTodoRequest, Todo, TodoClient, JSONPLACEHOLDER_BASE_URL};
