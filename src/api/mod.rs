pub mod errors;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod user_extractor;

pub use router::{
    authenticate, chain, handler_fn, AdminRouter, Middleware, RequestContext, RouteHandler,
    RouteMethod, RouteTable,
};
pub use routes::register_core_routes;
