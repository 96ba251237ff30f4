//! Admission webhook that injects device plugin resource requests for the
//! secondary networks a pod selects.

pub mod admit;
pub mod codec;
pub mod error;
pub mod handler;
pub mod nad;
pub mod resolve;
pub mod selection;
pub mod switches;
pub mod typings;

pub use error::{Result, WebhookError};
pub use handler::Webhook;

pub fn rocket(webhook: Webhook) -> rocket::Rocket<rocket::Build> {
    rocket::build().manage(webhook).mount(
        "/",
        rocket::routes![handler::health, handler::mutate, handler::validate],
    )
}
