//! Route table, mirroring the teacher's `routes::configure` shape: one
//! function taking `&mut web::ServiceConfig`, mounted from `main.rs` via
//! `App::new().configure(routes::configure)`.

use actix_web::web;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check)).service(
        web::scope("/auth")
            .route("/register", web::post().to(handlers::register))
            .route("/login", web::post().to(handlers::login))
            .route("/logout", web::post().to(handlers::logout))
            .route("/me", web::get().to(handlers::me)),
    ).service(
        web::scope("/terminal")
            .route("/init", web::get().to(handlers::terminal_init))
            .route("/command", web::post().to(handlers::terminal_command))
            .route("/session", web::get().to(handlers::terminal_session)),
    );
}
