pub mod employee;
pub mod ids;
pub mod invite_link;
pub mod note;
pub mod project;
pub mod task;
