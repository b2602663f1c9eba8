use rocket::Route;

mod common;
mod polls;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(polls::routes());
    routes.extend(voting::routes());
    routes
}
