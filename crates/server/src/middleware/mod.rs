pub mod model_loaders;

pub use model_loaders::{load_own_employee_middleware, load_project_middleware};
