//! CrudService: generic CRUD using safe SQL builder.

mod crud;
mod query;
mod validation;
pub use crud::{CrudService, Page};
pub use query::{
    parse_pagination, parse_search, Filter, Op, Operand, OrderBy, Pagination, SearchParams,
};
pub use validation::RequestValidator;
