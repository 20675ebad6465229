use crate::{
    api::{admin, attendance, request, timesheet},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(build_limiter(config.rate_protected_per_min))
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("").route(web::get().to(attendance::punch_status)),
                    )
                    // punch endpoints get their own, tighter limiter
                    .service(
                        web::resource("/clock-in")
                            .wrap(build_limiter(config.rate_punch_per_min))
                            .route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out")
                            .wrap(build_limiter(config.rate_punch_per_min))
                            .route(web::post().to(attendance::clock_out)),
                    )
                    .service(
                        web::resource("/break-in")
                            .wrap(build_limiter(config.rate_punch_per_min))
                            .route(web::post().to(attendance::break_in)),
                    )
                    .service(
                        web::resource("/break-out")
                            .wrap(build_limiter(config.rate_punch_per_min))
                            .route(web::post().to(attendance::break_out)),
                    ),
            )
            .service(
                web::scope("/timesheet")
                    // /timesheet
                    .service(web::resource("").route(web::get().to(timesheet::month_index)))
                    // /timesheet/{date}
                    .service(web::resource("/{date}").route(web::get().to(timesheet::show_day))),
            )
            .service(
                web::scope("/requests")
                    // /requests
                    .service(
                        web::resource("")
                            .route(web::post().to(request::submit_correction))
                            .route(web::get().to(request::list_my_requests)),
                    ),
            )
            .service(
                web::scope("/admin")
                    // /admin/requests
                    .service(web::resource("/requests").route(web::get().to(admin::list_requests)))
                    // /admin/requests/{id}/approve
                    .service(
                        web::resource("/requests/{id}/approve")
                            .route(web::post().to(admin::approve_request)),
                    )
                    // /admin/attendances
                    .service(
                        web::resource("/attendances")
                            .route(web::get().to(admin::list_day))
                            .route(web::post().to(admin::create_attendance)),
                    )
                    // /admin/attendances/{id}
                    .service(
                        web::resource("/attendances/{id}")
                            .route(web::get().to(admin::show_attendance))
                            .route(web::put().to(admin::update_attendance)),
                    ),
            ),
    );
}
