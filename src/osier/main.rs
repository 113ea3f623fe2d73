use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::middleware;
use actix_web::middleware::DefaultHeaders;
use actix_web::web;
use actix_web::web::Query;
use actix_web::{App, HttpServer};
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use tramline::models::RealtimeObservation;
use tramline::models::ScheduledStopEntry;
use tramline::resolution::DepartureQueryParams;
use tramline::resolution::resolve_next_departures;
use tramline::storage::MemoryDepartureStore;

const MAX_REQUESTED_LIMIT: usize = 500;

#[derive(Deserialize, Clone, Debug)]
struct DeparturesQuery {
    /// Comma-separated stop ids, OR semantics.
    stop_ids: Option<String>,
    route_id: Option<String>,
    direction_id: Option<i16>,
    limit: Option<usize>,
    min_time_threshold_seconds: Option<i64>,
    data_window_minutes: Option<i64>,
    max_per_route_stop: Option<usize>,
    use_fallback: Option<bool>,
    min_unique_routes: Option<usize>,
    timezone: Option<String>,
}

async fn index(_req: HttpRequest) -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/plain"))
        .body("Hello World from the Tramline Osier departure endpoint!")
}

#[actix_web::get("/microtime")]
pub async fn microtime(_req: HttpRequest) -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/plain"))
        .body(format!(
            "{}",
            tramline::duration_since_unix_epoch().as_micros()
        ))
}

#[actix_web::get("/departures")]
pub async fn departures(
    _req: HttpRequest,
    query: Query<DeparturesQuery>,
    store: web::Data<MemoryDepartureStore>,
) -> impl Responder {
    let requested_limit = query.limit.unwrap_or(10);
    if requested_limit == 0 || requested_limit > MAX_REQUESTED_LIMIT {
        return HttpResponse::BadRequest().body(format!(
            "limit must be between 1 and {}",
            MAX_REQUESTED_LIMIT
        ));
    }

    let timezone = match &query.timezone {
        Some(raw) => match chrono_tz::Tz::from_str_insensitive(raw) {
            Ok(tz) => tz,
            Err(_) => {
                return HttpResponse::BadRequest().body(format!("unknown timezone {}", raw));
            }
        },
        None => chrono_tz::UTC,
    };

    let stop_ids = query.stop_ids.as_ref().map(|raw| {
        raw.split(',')
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(|id| id.into())
            .collect::<Vec<_>>()
    });

    let defaults = DepartureQueryParams::default();
    let params = DepartureQueryParams {
        stop_ids,
        route_id: query.route_id.as_deref().map(|id| id.into()),
        direction_id: query.direction_id,
        requested_limit,
        min_time_threshold_seconds: query
            .min_time_threshold_seconds
            .unwrap_or(defaults.min_time_threshold_seconds),
        data_window_minutes: query
            .data_window_minutes
            .unwrap_or(defaults.data_window_minutes),
        max_per_route_stop: query
            .max_per_route_stop
            .unwrap_or(defaults.max_per_route_stop),
        use_fallback: query.use_fallback.unwrap_or(defaults.use_fallback),
        min_unique_routes: query
            .min_unique_routes
            .unwrap_or(defaults.min_unique_routes),
        timezone,
    };

    match resolve_next_departures(store.get_ref(), &params, Utc::now()).await {
        Ok(rows) => HttpResponse::Ok()
            .insert_header(("Cache-Control", "no-cache"))
            .json(rows),
        Err(e) => {
            log::error!("departure resolution failed: {}", e);
            HttpResponse::ServiceUnavailable().body("temporarily unavailable")
        }
    }
}

fn load_snapshots(store: &MemoryDepartureStore) -> anyhow::Result<()> {
    if let Ok(path) = std::env::var("OBSERVATIONS_PATH") {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading observations snapshot {}", path))?;
        let rows: Vec<RealtimeObservation> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing observations snapshot {}", path))?;
        log::info!("loaded {} realtime observations from {}", rows.len(), path);
        store.replace_observations(rows);
    } else {
        log::warn!("OBSERVATIONS_PATH not set, starting with no realtime data");
    }

    if let Ok(path) = std::env::var("TIMETABLE_PATH") {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading timetable snapshot {}", path))?;
        let rows: Vec<ScheduledStopEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing timetable snapshot {}", path))?;
        log::info!("loaded {} scheduled stop entries from {}", rows.len(), path);
        store.replace_timetable(rows);
    } else {
        log::warn!("TIMETABLE_PATH not set, starting with no timetable data");
    }

    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let store = MemoryDepartureStore::new();
    load_snapshots(&store)?;

    let bind_addr = std::env::var("OSIER_BIND").unwrap_or_else(|_| String::from("127.0.0.1:17420"));
    log::info!("osier listening on {}", bind_addr);

    let builder = HttpServer::new(move || {
        App::new()
            .wrap(DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*")))
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(store.clone()))
            .route("/", web::get().to(index))
            .service(microtime)
            .service(departures)
    })
    .workers(4);

    builder.bind(bind_addr)?.run().await?;

    Ok(())
}
