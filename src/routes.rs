use crate::{
    api::{agent, attendance, office, rfid, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP rate limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
    scan: Limiter,
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} per minute"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
            scan: build_limiter(config.rate_scan_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/rfid")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::rfid_login)),
            )
            .service(
                web::resource("/bootstrap")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::bootstrap)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Card readers; registered ahead of the protected scope so its auth
    // middleware never sees these requests
    cfg.service(
        web::scope("/api/rfid")
            .wrap(limiters.scan.clone())
            .configure(rfid::configure),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/offices")
                    // /offices
                    .service(
                        web::resource("")
                            .route(web::get().to(office::list_offices))
                            .route(web::post().to(office::create_office)),
                    )
                    // /offices/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(office::update_office))
                            .route(web::delete().to(office::delete_office)),
                    ),
            )
            .service(
                web::scope("/agents")
                    // /agents
                    .service(
                        web::resource("")
                            .route(web::get().to(agent::list_agents))
                            .route(web::post().to(agent::create_agent)),
                    )
                    // /agents/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(agent::get_agent))
                            .route(web::put().to(agent::update_agent))
                            .route(web::delete().to(agent::delete_agent)),
                    ),
            )
            .service(
                web::scope("/users")
                    // /users
                    .service(
                        web::resource("")
                            .route(web::get().to(user::list_users))
                            .route(web::post().to(user::create_user)),
                    )
                    // /users/profile
                    .service(web::resource("/profile").route(web::get().to(user::profile)))
                    // /users/{id}
                    .service(web::resource("/{id}").route(web::delete().to(user::delete_user)))
                    // /users/{id}/role
                    .service(web::resource("/{id}/role").route(web::put().to(user::update_role))),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("").route(web::get().to(attendance::list_attendance)),
                    )
                    // /attendance/check
                    .service(
                        web::resource("/check").route(web::post().to(attendance::check_attendance)),
                    )
                    // /attendance/latest-status
                    .service(
                        web::resource("/latest-status")
                            .route(web::get().to(attendance::latest_status)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// RFID LOGIN
//  └─ access_token (role AGENT, no refresh)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + refresh_token
