//! Prints the OpenAPI document as pretty JSON.
//!
//! Usage: cargo run --bin generate_openapi > openapi.json

use shed_control_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialise OpenAPI spec");
    println!("{json}");
}
